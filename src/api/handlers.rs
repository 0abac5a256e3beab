use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::logic::{apply_query, apply_to_single, QueryError, QueryOptions, QueryParams, Record};
use crate::model::{Category, FieldError, Id, Product, ProductInput};
use crate::service::ProductService;
use crate::store::{Store, StoreError};

pub type AppState<S> = Arc<S>;

/// Relations each entity can expand. The relations are eagerly embedded on
/// reads either way; $expand against anything else is a client error.
const PRODUCT_RELATIONS: &[&str] = &["Category"];
const CATEGORY_RELATIONS: &[&str] = &["Products"];

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// OData-style collection envelope.
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    #[serde(rename = "@odata.count", skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub value: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            details: None,
        }
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            error: "validation failed".to_string(),
            details: Some(details),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn not_found(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

fn internal_error(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(&err.to_string())),
    )
}

fn query_error(err: QueryError) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(&err.to_string())))
}

fn to_record<T: Serialize>(entity: &T) -> Result<Record, ApiError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("entity did not serialize to an object")),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(&e.to_string())),
        )),
    }
}

fn collection(
    records: Vec<Record>,
    params: &QueryParams,
    relations: &[&str],
) -> Result<Json<CollectionResponse>, ApiError> {
    let options = QueryOptions::from_params(params).map_err(query_error)?;
    let outcome = apply_query(records, &options, relations).map_err(query_error)?;
    Ok(Json(CollectionResponse {
        count: outcome.total,
        value: outcome.items.into_iter().map(Value::Object).collect(),
    }))
}

// === Product endpoints ===

pub async fn list_products<S: Store>(
    State(store): State<AppState<S>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let service = ProductService::new(store);
    let products = service.list_products().await.map_err(internal_error)?;
    let records = products
        .iter()
        .map(to_record)
        .collect::<Result<Vec<_>, _>>()?;
    collection(records, &params, PRODUCT_RELATIONS)
}

pub async fn get_product<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    let service = ProductService::new(store);
    let options = QueryOptions::from_params(&params).map_err(query_error)?;
    match service.get_product(id).await.map_err(internal_error)? {
        Some(product) => {
            let record = to_record(&product)?;
            let record =
                apply_to_single(record, &options, PRODUCT_RELATIONS).map_err(query_error)?;
            Ok(Json(Value::Object(record)))
        }
        None => Err(not_found("Product not found")),
    }
}

pub async fn create_product<S: Store>(
    State(store): State<AppState<S>>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let errors = input.validate();
    if !errors.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::validation(errors))));
    }

    let service = ProductService::new(store);
    let created = match service.create_product(input).await {
        Ok(created) => created,
        // The store enforces id uniqueness under its write lock; surface
        // the conflict as a validation error, anything else as a 500
        Err(err) => match err.downcast_ref::<StoreError>() {
            Some(StoreError::DuplicateId(_)) => {
                let detail = FieldError::new("Id", "a product with this id already exists");
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::validation(vec![detail])),
                ));
            }
            None => return Err(internal_error(err)),
        },
    };
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_product<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let errors = input.validate();
    if !errors.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::validation(errors))));
    }

    let service = ProductService::new(store);
    let updated = service
        .update_product(id, input)
        .await
        .map_err(internal_error)?;
    Ok(Json(updated))
}

pub async fn delete_product<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, ApiError> {
    let service = ProductService::new(store);
    service.delete_product(id).await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// === Category endpoints (read-only) ===

async fn category_with_products<S: Store>(
    store: &S,
    category: Category,
) -> Result<Category, anyhow::Error> {
    let products = store
        .list_products()
        .await?
        .into_iter()
        .filter(|p| p.category_id == category.id)
        .collect();
    Ok(Category {
        products: Some(products),
        ..category
    })
}

pub async fn list_categories<S: Store>(
    State(store): State<AppState<S>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let categories = store.list_categories().await.map_err(internal_error)?;
    let mut records = Vec::with_capacity(categories.len());
    for category in categories {
        let resolved = category_with_products(&*store, category)
            .await
            .map_err(internal_error)?;
        records.push(to_record(&resolved)?);
    }
    collection(records, &params, CATEGORY_RELATIONS)
}

pub async fn get_category<S: Store>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Value>, ApiError> {
    let options = QueryOptions::from_params(&params).map_err(query_error)?;
    match store.get_category(id).await.map_err(internal_error)? {
        Some(category) => {
            let resolved = category_with_products(&*store, category)
                .await
                .map_err(internal_error)?;
            let record = to_record(&resolved)?;
            let record =
                apply_to_single(record, &options, CATEGORY_RELATIONS).map_err(query_error)?;
            Ok(Json(Value::Object(record)))
        }
        None => Err(not_found("Category not found")),
    }
}

// === Custom function and action ===

/// Function endpoint: products priced above 500, still filterable,
/// sortable and pageable through the same query options.
pub async fn get_expensive_products<S: Store>(
    State(store): State<AppState<S>>,
    Query(params): Query<QueryParams>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let service = ProductService::new(store);
    let products = service.expensive_products().await.map_err(internal_error)?;
    let records = products
        .iter()
        .map(to_record)
        .collect::<Result<Vec<_>, _>>()?;
    collection(records, &params, PRODUCT_RELATIONS)
}

/// Action endpoint: unconditionally zeroes all product prices.
pub async fn reset_prices<S: Store>(
    State(store): State<AppState<S>>,
) -> Result<String, ApiError> {
    let service = ProductService::new(store);
    let status = service.reset_prices().await.map_err(internal_error)?;
    log::info!("reset all product prices to 0");
    Ok(status)
}
