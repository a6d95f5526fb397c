pub mod admin_service;
pub mod auth_service;
pub mod banner_service;
pub mod cart_service;
pub mod category_service;
pub mod debt_service;
pub mod home_service;
pub mod operator_service;
pub mod order_service;
pub mod payment_service;
pub mod product_service;
pub mod review_service;
pub mod settings_service;
pub mod shipping_service;
pub mod stats_service;

/// Lowercase ASCII slug: `"Remera Oversize Negra"` becomes `"remera-oversize-negra"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for ch in input.trim().chars() {
        let ch = match ch {
            'á' | 'à' | 'ä' | 'Á' => 'a',
            'é' | 'è' | 'ë' | 'É' => 'e',
            'í' | 'ì' | 'ï' | 'Í' => 'i',
            'ó' | 'ò' | 'ö' | 'Ó' => 'o',
            'ú' | 'ù' | 'ü' | 'Ú' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other.to_ascii_lowercase(),
        };
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_strips_accents_and_punctuation() {
        assert_eq!(slugify("Remera Oversize Negra"), "remera-oversize-negra");
        assert_eq!(slugify("  Pantalón  Cargo!! "), "pantalon-cargo");
        assert_eq!(slugify("Niño & Niña"), "nino-nina");
        assert_eq!(slugify("---"), "");
    }
}
