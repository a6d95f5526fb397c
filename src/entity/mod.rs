pub mod audit_logs;
pub mod banners;
pub mod cart_items;
pub mod categories;
pub mod debt_transactions;
pub mod debts;
pub mod home_sections;
pub mod operators;
pub mod order_items;
pub mod orders;
pub mod product_variants;
pub mod products;
pub mod reviews;
pub mod shipping_labels;
pub mod site_settings;
pub mod special_filters;
pub mod subcategories;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use banners::Entity as Banners;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use debt_transactions::Entity as DebtTransactions;
pub use debts::Entity as Debts;
pub use home_sections::Entity as HomeSections;
pub use operators::Entity as Operators;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use shipping_labels::Entity as ShippingLabels;
pub use site_settings::Entity as SiteSettings;
pub use special_filters::Entity as SpecialFilters;
pub use subcategories::Entity as Subcategories;
pub use users::Entity as Users;
