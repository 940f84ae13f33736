//! Hero routes
//!
//! Hero CRUD, filtered listing, team list and power-level statistics.

use axum::{extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::api::{
    paginate, ApiPath, ApiResponse, Created, PageSource, Pagination, ValidatedJson, ValidatedQuery,
};
use crate::app::AppState;
use crate::domain::heroes::{
    title_case, CreateHeroRequest, HeroFilter, HeroResponse, PowerBucket, PowerDistribution,
    PowerStatistics, UpdateHeroRequest, POWER_RANGES,
};
use crate::error::{ApiError, ApiResult};

const HERO_COLUMNS: &str = "id, name, secret_name, age, description, power_level, is_active, \
                            avatar_url, team, abilities, weakness, created_at, updated_at";

/// Database row for hero
#[derive(Debug, sqlx::FromRow)]
struct HeroRow {
    id: i64,
    name: String,
    secret_name: String,
    age: Option<i64>,
    description: Option<String>,
    power_level: i64,
    is_active: bool,
    avatar_url: Option<String>,
    team: Option<String>,
    /// JSON array of strings
    abilities: Option<String>,
    weakness: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<HeroRow> for HeroResponse {
    fn from(row: HeroRow) -> Self {
        let abilities = row.abilities.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| tracing::warn!(hero_id = row.id, error = %e, "Unreadable abilities"))
                .ok()
        });

        Self {
            id: row.id,
            name: row.name,
            secret_name: row.secret_name,
            age: row.age,
            description: row.description,
            power_level: row.power_level,
            is_active: row.is_active,
            avatar_url: row.avatar_url,
            team: row.team,
            abilities,
            weakness: row.weakness,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Heroes matching a filter, in id order
struct FilteredHeroes<'a> {
    db: &'a SqlitePool,
    filter: &'a HeroFilter,
}

impl<'a> FilteredHeroes<'a> {
    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");

        if self.filter.active_only {
            qb.push(" AND is_active = 1");
        }
        if let Some(team) = &self.filter.team {
            qb.push(" AND team = ").push_bind(team.clone());
        }
        if let Some(min) = self.filter.min_power_level {
            qb.push(" AND power_level >= ").push_bind(min);
        }
        if let Some(max) = self.filter.max_power_level {
            qb.push(" AND power_level <= ").push_bind(max);
        }
        if let Some(search) = &self.filter.search {
            let pattern = contains_pattern(search);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

#[async_trait::async_trait]
impl<'a> PageSource for FilteredHeroes<'a> {
    type Item = HeroRow;
    type Error = sqlx::Error;

    async fn count(&self) -> Result<u64, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM heroes");
        self.push_conditions(&mut qb);

        let total: i64 = qb.build_query_scalar().fetch_one(self.db).await?;
        Ok(total.max(0) as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<HeroRow>, sqlx::Error> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM heroes", HERO_COLUMNS));
        self.push_conditions(&mut qb);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        qb.build_query_as::<HeroRow>().fetch_all(self.db).await
    }
}

/// `%term%` for a case-insensitive LIKE, with wildcards in the term escaped
fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn normalized_name(field: &str, value: &str) -> Result<String, ApiError> {
    let name = title_case(value);
    if name.is_empty() {
        return Err(ApiError::Validation(format!("{}: must not be blank", field)));
    }
    Ok(name)
}

fn abilities_json(abilities: Option<&Vec<String>>) -> Result<Option<String>, ApiError> {
    abilities
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ApiError::internal(format!("Failed to encode abilities: {}", e)))
}

async fn fetch_hero(db: &SqlitePool, hero_id: i64) -> ApiResult<HeroRow> {
    sqlx::query_as::<_, HeroRow>(&format!("SELECT {} FROM heroes WHERE id = ?", HERO_COLUMNS))
        .bind(hero_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Hero not found"))
}

/// Reject a name already held by a different hero
async fn ensure_name_free(
    db: &SqlitePool,
    name: &str,
    exclude_id: Option<i64>,
) -> ApiResult<()> {
    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM heroes WHERE name = ? AND id != ?")
        .bind(name)
        .bind(exclude_id.unwrap_or(0))
        .fetch_optional(db)
        .await?;

    match taken {
        Some(_) => Err(ApiError::conflict("Hero name already exists")),
        None => Ok(()),
    }
}

/// POST /api/v1/heroes
pub async fn create_hero(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateHeroRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = normalized_name("name", &req.name)?;
    let secret_name = normalized_name("secret_name", &req.secret_name)?;

    ensure_name_free(&state.db, &name, None).await?;

    let row = sqlx::query_as::<_, HeroRow>(&format!(
        r#"
        INSERT INTO heroes (name, secret_name, age, description, power_level, is_active,
                            avatar_url, team, abilities, weakness, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        HERO_COLUMNS
    ))
    .bind(&name)
    .bind(&secret_name)
    .bind(req.age)
    .bind(&req.description)
    .bind(req.power_level)
    .bind(req.is_active)
    .bind(&req.avatar_url)
    .bind(&req.team)
    .bind(abilities_json(req.abilities.as_ref())?)
    .bind(&req.weakness)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(hero_id = row.id, name = %row.name, "Hero created");

    Ok(Created(ApiResponse::success(
        HeroResponse::from(row),
        "Hero created successfully",
    )))
}

/// GET /api/v1/heroes
///
/// Filtered, paginated hero list.
pub async fn list_heroes(
    State(state): State<Arc<AppState>>,
    Pagination(params): Pagination,
    ValidatedQuery(filter): ValidatedQuery<HeroFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let source = FilteredHeroes {
        db: &state.db,
        filter: &filter,
    };
    let page = paginate(&source, params).await?;

    Ok(ApiResponse::success(
        page.map(HeroResponse::from),
        "Heroes retrieved successfully",
    ))
}

/// GET /api/v1/heroes/:hero_id
pub async fn get_hero(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_hero(&state.db, hero_id).await?;

    Ok(ApiResponse::success(
        HeroResponse::from(row),
        "Hero retrieved successfully",
    ))
}

/// GET /api/v1/heroes/name/:hero_name
///
/// First hero (by id) whose name contains the given text, ignoring case.
pub async fn get_hero_by_name(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_name): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, HeroRow>(&format!(
        "SELECT {} FROM heroes WHERE name LIKE ? ESCAPE '\\' ORDER BY id LIMIT 1",
        HERO_COLUMNS
    ))
    .bind(contains_pattern(&hero_name))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Hero not found"))?;

    Ok(ApiResponse::success(
        HeroResponse::from(row),
        "Hero retrieved successfully",
    ))
}

/// PUT /api/v1/heroes/:hero_id
///
/// Partial update; absent fields keep their current value and an explicit
/// `null` clears a nullable one.
pub async fn update_hero(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_id): ApiPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateHeroRequest>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_hero(&state.db, hero_id).await?;

    let name = req
        .name
        .as_deref()
        .map(|n| normalized_name("name", n))
        .transpose()?;
    let secret_name = req
        .secret_name
        .as_deref()
        .map(|n| normalized_name("secret_name", n))
        .transpose()?;

    if let Some(name) = &name {
        ensure_name_free(&state.db, name, Some(hero_id)).await?;
    }

    let abilities = abilities_json(req.abilities.as_ref().and_then(Option::as_ref))?;

    let row = sqlx::query_as::<_, HeroRow>(&format!(
        r#"
        UPDATE heroes SET
            name = COALESCE(?, name),
            secret_name = COALESCE(?, secret_name),
            age = CASE WHEN ? THEN ? ELSE age END,
            description = CASE WHEN ? THEN ? ELSE description END,
            power_level = COALESCE(?, power_level),
            is_active = COALESCE(?, is_active),
            avatar_url = CASE WHEN ? THEN ? ELSE avatar_url END,
            team = CASE WHEN ? THEN ? ELSE team END,
            abilities = CASE WHEN ? THEN ? ELSE abilities END,
            weakness = CASE WHEN ? THEN ? ELSE weakness END,
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        HERO_COLUMNS
    ))
    .bind(&name)
    .bind(&secret_name)
    .bind(req.age.is_some())
    .bind(req.age.flatten())
    .bind(req.description.is_some())
    .bind(req.description.flatten())
    .bind(req.power_level)
    .bind(req.is_active)
    .bind(req.avatar_url.is_some())
    .bind(req.avatar_url.flatten())
    .bind(req.team.is_some())
    .bind(req.team.flatten())
    .bind(req.abilities.is_some())
    .bind(abilities)
    .bind(req.weakness.is_some())
    .bind(req.weakness.flatten())
    .bind(Utc::now())
    .bind(hero_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Hero not found"))?;

    tracing::info!(hero_id, "Hero updated");

    Ok(ApiResponse::success(
        HeroResponse::from(row),
        "Hero updated successfully",
    ))
}

/// DELETE /api/v1/heroes/:hero_id
///
/// Permanent delete.
pub async fn delete_hero(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM heroes WHERE id = ?")
        .bind(hero_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Hero not found"));
    }

    tracing::info!(hero_id, "Hero deleted");

    Ok(ApiResponse::message("Hero deleted successfully"))
}

async fn set_active(db: &SqlitePool, hero_id: i64, active: bool) -> ApiResult<HeroRow> {
    let row = sqlx::query_as::<_, HeroRow>(&format!(
        "UPDATE heroes SET is_active = ?, updated_at = ? WHERE id = ? RETURNING {}",
        HERO_COLUMNS
    ))
    .bind(active)
    .bind(Utc::now())
    .bind(hero_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Hero not found"))?;

    tracing::info!(hero_id, active, "Hero activation changed");
    Ok(row)
}

/// POST /api/v1/heroes/:hero_id/activate
pub async fn activate_hero(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = set_active(&state.db, hero_id, true).await?;
    Ok(ApiResponse::success(HeroResponse::from(row), "Hero activated"))
}

/// POST /api/v1/heroes/:hero_id/deactivate
pub async fn deactivate_hero(
    State(state): State<Arc<AppState>>,
    ApiPath(hero_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = set_active(&state.db, hero_id, false).await?;
    Ok(ApiResponse::success(HeroResponse::from(row), "Hero deactivated"))
}

/// GET /api/v1/heroes/teams/list
///
/// Distinct teams of active heroes, alphabetical.
pub async fn list_teams(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let teams: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT team FROM heroes
        WHERE is_active = 1 AND team IS NOT NULL AND team != ''
        ORDER BY team
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::success(teams, "Teams retrieved successfully"))
}

/// GET /api/v1/heroes/stats/power-distribution
pub async fn power_distribution(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let (min_power, max_power, avg_power, total_heroes): (Option<i64>, Option<i64>, Option<f64>, i64) =
        sqlx::query_as(
            r#"
            SELECT MIN(power_level), MAX(power_level), AVG(power_level), COUNT(id)
            FROM heroes WHERE is_active = 1
            "#,
        )
        .fetch_one(&state.db)
        .await?;

    let mut distribution = Vec::with_capacity(POWER_RANGES.len());
    for range in POWER_RANGES {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(id) FROM heroes WHERE is_active = 1 AND power_level BETWEEN ? AND ?",
        )
        .bind(range.min)
        .bind(range.max)
        .fetch_one(&state.db)
        .await?;

        distribution.push(PowerBucket {
            range: format!("{}-{}", range.min, range.max),
            label: range.label.to_string(),
            count,
        });
    }

    let statistics = PowerStatistics {
        min_power,
        max_power,
        avg_power: avg_power.map_or(0.0, |avg| (avg * 100.0).round() / 100.0),
        total_heroes,
    };

    Ok(ApiResponse::success(
        PowerDistribution {
            statistics,
            distribution,
        },
        "Power distribution retrieved successfully",
    ))
}
