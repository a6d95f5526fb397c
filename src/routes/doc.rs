use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        banners::{
            BannerList, BannerRequest, HomeSectionList, HomeSectionRequest, SpecialFilterList,
            SpecialFilterRequest,
        },
        cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
        categories::{
            CategoryRequest, CategoryTree, SubcategoryRequest, UpdateCategoryRequest,
            UpdateSubcategoryRequest,
        },
        debts::{
            ChargeRequest, CreateDebtRequest, DebtDetail, DebtList, DebtSummary, PaymentRequest,
            UpdateDebtRequest,
        },
        home::{HomePage, ResolvedSection},
        operators::{CreateOperatorRequest, OperatorList, UpdateOperatorRequest},
        orders::{
            CheckoutRequest, CheckoutResponse, MarkPaidRequest, OrderList, OrderWithItems,
            ShippingAddress, UpdateOrderStatusRequest,
        },
        payments::{PaymentNotification, PaymentNotificationData, WebhookAck},
        products::{
            CreateProductRequest, ProductList, StockAdjustRequest, UpdateProductRequest,
            VariantInput,
        },
        reviews::{CreateReviewRequest, ProductReviews, ReviewList},
        shipping::ShippingLabelRequest,
        stats::{Dashboard, StatusCount, TopProduct},
    },
    installments::{DebtStatus, Installment},
    models::{
        Banner, CartItem, Category, Debt, DebtTransaction, DebtTransactionKind, HomeSection,
        Operator, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Permission,
        Product, ProductVariant, Review, ReviewStatus, SectionKind, ShippingLabel,
        ShippingMethod, SiteSettings, SpecialFilter, Subcategory, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, debts, health, operators, orders, params, payments,
        products, reviews, storefront,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        operators::login,
        operators::list_operators,
        operators::create_operator,
        operators::update_operator,
        operators::delete_operator,
        categories::list_categories,
        categories::admin_list_categories,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        categories::create_subcategory,
        categories::update_subcategory,
        categories::delete_subcategory,
        products::list_products,
        products::get_product,
        products::list_reviews,
        products::create_review,
        products::admin_list_products,
        products::admin_get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_low_stock,
        products::adjust_stock,
        cart::list_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        payments::webhook,
        storefront::home,
        storefront::list_banners,
        storefront::list_filters,
        storefront::filter_products,
        storefront::get_settings,
        storefront::admin_list_banners,
        storefront::create_banner,
        storefront::update_banner,
        storefront::delete_banner,
        storefront::list_sections,
        storefront::create_section,
        storefront::update_section,
        storefront::delete_section,
        storefront::admin_list_filters,
        storefront::create_filter,
        storefront::update_filter,
        storefront::delete_filter,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::mark_paid,
        admin::get_shipping_label,
        admin::create_shipping_label,
        admin::update_settings,
        admin::dashboard,
        debts::list_debts,
        debts::create_debt,
        debts::get_debt,
        debts::update_debt,
        debts::delete_debt,
        debts::add_charge,
        debts::add_payment,
        debts::delete_last_transaction,
        reviews::list_reviews,
        reviews::approve_review,
        reviews::delete_review
    ),
    components(
        schemas(
            User,
            Operator,
            Permission,
            Category,
            Subcategory,
            Product,
            ProductVariant,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            ShippingMethod,
            ShippingLabel,
            Debt,
            DebtTransaction,
            DebtTransactionKind,
            Installment,
            DebtStatus,
            Review,
            ReviewStatus,
            Banner,
            HomeSection,
            SectionKind,
            SpecialFilter,
            SiteSettings,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateOperatorRequest,
            UpdateOperatorRequest,
            OperatorList,
            CategoryRequest,
            UpdateCategoryRequest,
            SubcategoryRequest,
            UpdateSubcategoryRequest,
            CategoryTree,
            VariantInput,
            CreateProductRequest,
            UpdateProductRequest,
            StockAdjustRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartList,
            ShippingAddress,
            CheckoutRequest,
            CheckoutResponse,
            OrderWithItems,
            OrderList,
            UpdateOrderStatusRequest,
            MarkPaidRequest,
            ShippingLabelRequest,
            PaymentNotification,
            PaymentNotificationData,
            WebhookAck,
            CreateDebtRequest,
            UpdateDebtRequest,
            ChargeRequest,
            PaymentRequest,
            DebtSummary,
            DebtDetail,
            DebtList,
            CreateReviewRequest,
            ProductReviews,
            ReviewList,
            BannerRequest,
            BannerList,
            HomeSectionRequest,
            HomeSectionList,
            SpecialFilterRequest,
            SpecialFilterList,
            ResolvedSection,
            HomePage,
            StatusCount,
            TopProduct,
            Dashboard,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            params::DebtListQuery,
            params::ReviewListQuery,
            params::DateRange,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>,
            ApiResponse<DebtDetail>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Customer authentication endpoints"),
        (name = "Operators", description = "Back-office staff accounts"),
        (name = "Categories", description = "Category and subcategory endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment processor callbacks"),
        (name = "Storefront", description = "Home page, banners, filters and settings"),
        (name = "Merchandising", description = "Banner, home section and filter management"),
        (name = "Debts", description = "Customer accounts and installments"),
        (name = "Admin", description = "Order management, shipping, settings and stats"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
