use serde_json::json;
use urban_indumentaria_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    models::{Permission, SiteSettings},
    pricing,
    services::{auth_service::hash_password, settings_service, slugify},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    run_migrations(&pool).await?;

    let owner_id = ensure_owner(&pool, "Dueño", "admin@urban.local", "admin123").await?;
    let customer_id = ensure_customer(&pool, "Cliente Demo", "cliente@urban.local", "cliente123").await?;
    seed_catalog(&pool).await?;

    let orm = orm_from_pool(pool.clone());
    let current = settings_service::load_settings(&orm).await?;
    if current == SiteSettings::default() {
        settings_service::save_settings(&orm, &current).await?;
        println!("Saved default store settings");
    }

    println!("Seed completed. Owner ID: {owner_id}, Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_owner(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;
    let permissions: Vec<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO operators (id, name, email, password_hash, is_owner, permissions)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        ON CONFLICT (email) DO UPDATE SET is_owner = TRUE, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(json!(permissions))
    .fetch_one(pool)
    .await?;

    println!("Ensured owner operator {email}");
    Ok(id)
}

async fn ensure_customer(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, 'customer')
        ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    println!("Ensured customer {email}");
    Ok(id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str, position: i32) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, slug, position)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slugify(name))
    .bind(position)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_subcategory(
    pool: &sqlx::PgPool,
    category_id: Uuid,
    name: &str,
    position: i32,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO subcategories (id, category_id, name, slug, position)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (category_id, slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(category_id)
    .bind(name)
    .bind(slugify(name))
    .bind(position)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: i64,
    original_price: Option<i64>,
    sizes: &'static [(&'static str, i32)],
    featured: bool,
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let hombre = ensure_category(pool, "Hombre", 1).await?;
    let mujer = ensure_category(pool, "Mujer", 2).await?;
    let remeras = ensure_subcategory(pool, hombre, "Remeras", 1).await?;
    let buzos = ensure_subcategory(pool, hombre, "Buzos", 2).await?;
    let vestidos = ensure_subcategory(pool, mujer, "Vestidos", 1).await?;

    let catalog = [
        (
            hombre,
            remeras,
            SeedProduct {
                name: "Remera Oversize Negra",
                description: "Algodón peinado 24/1, calce amplio",
                price: 18_000,
                original_price: None,
                sizes: &[("S", 6), ("M", 10), ("L", 8), ("XL", 3)],
                featured: true,
            },
        ),
        (
            hombre,
            buzos,
            SeedProduct {
                name: "Buzo Canguro Gris",
                description: "Frisa invisible con capucha",
                price: 38_250,
                original_price: Some(45_000),
                sizes: &[("M", 4), ("L", 5)],
                featured: false,
            },
        ),
        (
            mujer,
            vestidos,
            SeedProduct {
                name: "Vestido Lino Verano",
                description: "Lino natural, largo midi",
                price: 42_000,
                original_price: None,
                sizes: &[("S", 2), ("M", 3)],
                featured: true,
            },
        ),
    ];

    for (category_id, subcategory_id, product) in catalog {
        let stock: i32 = product.sizes.iter().map(|(_, s)| s).sum();
        let discount_percent = product
            .original_price
            .and_then(|original| pricing::discount_percent(original, product.price));

        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, slug, description, category_id, subcategory_id,
                                  price, original_price, discount_percent, stock,
                                  is_featured, on_sale)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (slug) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(slugify(product.name))
        .bind(product.description)
        .bind(category_id)
        .bind(subcategory_id)
        .bind(product.price)
        .bind(product.original_price)
        .bind(discount_percent)
        .bind(stock)
        .bind(product.featured)
        .bind(product.original_price.is_some())
        .fetch_optional(pool)
        .await?;

        // Already seeded.
        let Some((product_id,)) = row else { continue };

        for (position, (size, stock)) in product.sizes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, size, stock, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(*size)
            .bind(*stock)
            .bind(position as i32)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded catalog");
    Ok(())
}
