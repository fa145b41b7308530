//! Board, premium, settings and instrument cache routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use super::proxy::validate_currency;
use super::{ApiError, AppState};
use crate::application::services::{
    BoardStatus, BoardView, CachedInstruments, PremiumView, RefreshReport,
};
use crate::domain::market::{Category, Exchange, MarketKey};
use crate::domain::settings::DisplaySettings;
use crate::domain::ticker::{SortKey, SortOrder, TickerQuery};
use crate::infrastructure::exchanges::BestQuote;

/// Board API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/boards", get(list_boards))
        .route("/api/boards/{exchange}/{category}", get(board_view))
        .route(
            "/api/boards/{exchange}/{category}/refresh",
            post(refresh_board),
        )
        .route("/api/premium", get(premium_view))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route(
            "/api/instruments/{exchange}/{category}",
            get(cached_instruments),
        )
        .route(
            "/api/instruments/{exchange}/refresh",
            post(refresh_instruments),
        )
        .route("/api/quotes/bithumb/{currency}", get(bithumb_quote))
}

/// Board view query string.
#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    /// Symbol substring.
    pub search: Option<String>,
    /// Quote code.
    pub quote: Option<String>,
    /// Sort column.
    pub sort: Option<String>,
    /// `asc` or `desc`.
    pub order: Option<String>,
    /// Row limit.
    pub limit: Option<String>,
}

impl TryFrom<ViewParams> for TickerQuery {
    type Error = ApiError;

    fn try_from(params: ViewParams) -> Result<Self, Self::Error> {
        let sort = params
            .sort
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<SortKey>)
            .transpose()
            .map_err(ApiError::BadRequest)?
            .unwrap_or_default();

        let order = match params.order.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("") => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(ApiError::BadRequest(format!("unknown sort order: {other}")));
            }
        };

        let limit = params
            .limit
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| ApiError::BadRequest(format!("invalid limit: {s}")))
            })
            .transpose()?;

        Ok(Self {
            search: params.search,
            quote: params.quote,
            sort,
            order,
            limit,
        })
    }
}

fn market(exchange: &str, category: &str) -> Result<MarketKey, ApiError> {
    Ok(MarketKey::new(exchange.parse()?, category.parse()?))
}

fn board(
    state: &AppState,
    market: MarketKey,
) -> Result<std::sync::Arc<crate::application::services::TickerBoard>, ApiError> {
    state
        .boards
        .get(market)
        .ok_or_else(|| ApiError::NotFound(format!("no board for {market}")))
}

// =============================================================================
// Boards
// =============================================================================

async fn list_boards(State(state): State<AppState>) -> Json<Vec<BoardStatus>> {
    Json(state.boards.statuses())
}

async fn board_view(
    State(state): State<AppState>,
    Path((exchange, category)): Path<(String, String)>,
    Query(params): Query<ViewParams>,
) -> Result<Json<BoardView>, ApiError> {
    let board = board(&state, market(&exchange, &category)?)?;
    let query = TickerQuery::try_from(params)?;
    Ok(Json(board.view(&query)))
}

async fn refresh_board(
    State(state): State<AppState>,
    Path((exchange, category)): Path<(String, String)>,
) -> Result<Json<BoardStatus>, ApiError> {
    let board = board(&state, market(&exchange, &category)?)?;
    board.refresh().await?;
    Ok(Json(board.status()))
}

// =============================================================================
// Premium and Quotes
// =============================================================================

async fn premium_view(State(state): State<AppState>) -> Result<Json<PremiumView>, ApiError> {
    let premium = state.premium.as_ref().ok_or_else(|| {
        ApiError::NotFound("premium view needs the bithumb:spot and bybit:spot boards".to_string())
    })?;
    Ok(Json(premium.view()))
}

async fn bithumb_quote(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> Result<Json<BestQuote>, ApiError> {
    let currency = validate_currency(&currency)?;
    Ok(Json(state.bithumb.best_quote(currency).await?))
}

// =============================================================================
// Settings
// =============================================================================

async fn get_settings(State(state): State<AppState>) -> Json<DisplaySettings> {
    Json(state.settings.load())
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<DisplaySettings>,
) -> Result<Json<DisplaySettings>, ApiError> {
    settings.validate().map_err(ApiError::BadRequest)?;
    state.settings.save(&settings).await?;
    Ok(Json(settings))
}

// =============================================================================
// Instrument Cache
// =============================================================================

async fn cached_instruments(
    State(state): State<AppState>,
    Path((exchange, category)): Path<(String, String)>,
) -> Result<Json<CachedInstruments>, ApiError> {
    let market = market(&exchange, &category)?;
    state
        .instruments
        .load(market)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no cached instruments for {market}")))
}

async fn refresh_instruments(
    State(state): State<AppState>,
    Path(exchange): Path<String>,
) -> Result<Json<RefreshReport>, ApiError> {
    let exchange: Exchange = exchange.parse()?;
    let source = state
        .sources
        .get(&exchange)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("no boards configured for {exchange}")))?;

    let categories: Vec<Category> = state
        .boards
        .iter()
        .map(|b| b.market())
        .filter(|m| m.exchange == exchange)
        .map(|m| m.category)
        .collect();
    if categories.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no boards configured for {exchange}"
        )));
    }

    let report = state.instruments.refresh(source.as_ref(), &categories).await;
    if !report.is_success() {
        let reasons: Vec<String> = report
            .failed
            .iter()
            .map(|(category, error)| format!("{category}: {error}"))
            .collect();
        return Err(ApiError::Upstream(format!(
            "instrument refresh failed for {exchange}: {}",
            reasons.join("; ")
        )));
    }
    Ok(Json(report))
}
