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
        auth::RegisterRequest,
        orders::{
            AddOrderItemRequest, CreateOrderRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList},
        seller_applications::{ApplicationList, ApplyRequest, DecisionRequest},
    },
    models::{
        ApplicationStatus, ApprovalStatus, Order, OrderItem, OrderStatus, Product, Review, Role,
        SellerApplication, User,
    },
    response::{ApiResponse, Meta},
    routes::{auth, health, orders, products, reviews, seller_applications},
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
        auth::me,
        products::list_products,
        products::get_product,
        products::list_by_category,
        products::search_products,
        products::search_suggestions,
        products::top_rated,
        products::recommendations,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_pending,
        products::list_by_seller,
        products::approve_product,
        products::reject_product,
        products::list_reviews,
        products::create_review,
        reviews::delete_review,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::list_user_orders,
        orders::update_status,
        orders::add_item,
        orders::remove_item,
        orders::track_order,
        seller_applications::apply,
        seller_applications::list_applications,
        seller_applications::list_pending,
        seller_applications::approve,
        seller_applications::reject
    ),
    components(
        schemas(
            Role,
            ApprovalStatus,
            OrderStatus,
            ApplicationStatus,
            User,
            Product,
            Order,
            OrderItem,
            SellerApplication,
            Review,
            RegisterRequest,
            CreateProductRequest,
            UpdateProductRequest,
            CreateOrderRequest,
            AddOrderItemRequest,
            UpdateOrderStatusRequest,
            ApplyRequest,
            DecisionRequest,
            CreateReviewRequest,
            ProductList,
            OrderList,
            OrderWithItems,
            ApplicationList,
            ReviewList,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<SellerApplication>,
            ApiResponse<ApplicationList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and current user"),
        (name = "Products", description = "Catalog, approval workflow and recommendations"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Orders", description = "Order lifecycle and public tracking"),
        (name = "Seller Applications", description = "Seller onboarding"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
