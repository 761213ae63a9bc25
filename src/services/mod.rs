pub mod account_service;
pub mod order_service;
pub mod product_service;
pub mod recommendation_service;
pub mod review_service;
pub mod seller_service;
