use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthUser, MaybeUser},
    config::Config,
    error::AppError,
    models::{Task, TaskInput, TaskPatch, TaskQuery},
};

const TASK_COLUMNS: &str = "id, profile_id, title, complete, creation_date, updated_date";

/// Retrieves the caller's tasks as one page of a paginated envelope.
///
/// Anonymous callers are allowed and receive an empty page; authenticated
/// callers only ever see tasks owned by their own profile. Results can be
/// narrowed by exact title, creation date range and a case-insensitive
/// title search, and ordered by creation date in either direction.
///
/// ## Query Parameters:
/// - `title` (optional): Exact title to match.
/// - `from_date` (optional): Keep tasks created on or after this date (YYYY-MM-DD).
/// - `to_date` (optional): Keep tasks created on or before this date (YYYY-MM-DD).
/// - `search` (optional): Case-insensitive substring to look for in titles.
/// - `ordering` (optional): `creation_date` for oldest first; defaults to newest first.
/// - `page` (optional): 1-based page number.
///
/// ## Responses:
/// - `200 OK`: `{"count", "next", "previous", "results"}` where `next`/`previous`
///   are absolute URLs or null.
/// - `404 Not Found`: If the page number is outside the available range.
/// - `500 Internal Server Error`: For database errors.
#[get("/")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query_params: web::Query<TaskQuery>,
    user: MaybeUser,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let page_token = parse_page(query_params.page.as_deref())?;

    let profile_id = match user.0 {
        Some(user) => user.profile_id,
        None => {
            // Nothing is owned by an anonymous caller.
            return Ok(HttpResponse::Ok().json(json!({
                "count": 0,
                "next": null,
                "previous": null,
                "results": [],
            })));
        }
    };

    // Conditions for title, date range and search are dynamically appended
    // and bound in the same order for the count and the page query.
    let mut conditions = vec!["profile_id = $1".to_string()];
    let mut param_count = 2;

    if query_params.title.is_some() {
        conditions.push(format!("title = ${}", param_count));
        param_count += 1;
    }
    if query_params.from_date.is_some() {
        conditions.push(format!("creation_date >= ${}", param_count));
        param_count += 1;
    }
    if query_params.to_date.is_some() {
        conditions.push(format!("creation_date < ${}", param_count));
        param_count += 1;
    }
    if query_params.search.is_some() {
        conditions.push(format!("title ILIKE ${}", param_count));
        param_count += 1;
    }

    let where_clause = conditions.join(" AND ");
    let order_clause = order_clause(query_params.ordering.as_deref());

    let count_sql = format!("SELECT COUNT(*) FROM tasks WHERE {}", where_clause);
    let page_sql = format!(
        "SELECT {} FROM tasks WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
        TASK_COLUMNS,
        where_clause,
        order_clause,
        param_count,
        param_count + 1
    );

    let from_bound = query_params.from_date.map(day_start);
    let to_bound = query_params.to_date.map(day_after);
    let search_pattern = query_params.search.as_ref().map(|s| format!("%{}%", s));

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(profile_id);
    let mut page_query = sqlx::query_as::<_, Task>(&page_sql).bind(profile_id);

    if let Some(title) = &query_params.title {
        count_query = count_query.bind(title);
        page_query = page_query.bind(title);
    }
    if let Some(from) = from_bound {
        count_query = count_query.bind(from);
        page_query = page_query.bind(from);
    }
    if let Some(to) = to_bound {
        count_query = count_query.bind(to);
        page_query = page_query.bind(to);
    }
    if let Some(pattern) = &search_pattern {
        count_query = count_query.bind(pattern);
        page_query = page_query.bind(pattern);
    }

    let count = count_query.fetch_one(&**pool).await?;

    let page_size = config.page_size.max(1);
    let total_pages = if count == 0 {
        1
    } else {
        (count + page_size - 1) / page_size
    };
    let page = match page_token {
        PageToken::Number(page) => page,
        PageToken::Last => total_pages,
    };
    if page > total_pages {
        return Err(AppError::NotFound("Invalid page.".into()));
    }

    let tasks = page_query
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&**pool)
        .await?;

    let base_url = request_base_url(&req);
    let results: Vec<Value> = tasks
        .iter()
        .map(|task| task.to_list_json(&base_url))
        .collect();

    let next = (page < total_pages).then(|| page_url(&req, page + 1));
    let previous = (page > 1).then(|| page_url(&req, page - 1));

    Ok(HttpResponse::Ok().json(json!({
        "count": count,
        "next": next,
        "previous": previous,
        "results": results,
    })))
}

/// Creates a new task owned by the caller's profile.
///
/// ## Request Body:
/// - `title`: 1 to 200 characters (required).
/// - `complete` (optional): Defaults to false.
///
/// ## Responses:
/// - `201 Created`: Returns the list representation of the new task,
///   links included.
/// - `400 Bad Request`: If validation on the payload fails.
/// - `401 Unauthorized`: If the request lacks a valid credential.
/// - `500 Internal Server Error`: For database errors.
#[post("/")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    user: AuthUser,
    task_data: web::Json<TaskInput>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, profile_id, title, complete)
         VALUES ($1, $2, $3, $4)
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user.0.profile_id)
    .bind(&task_data.title)
    .bind(task_data.complete)
    .fetch_one(&**pool)
    .await?;

    let base_url = request_base_url(&req);
    Ok(HttpResponse::Created().json(task.to_list_json(&base_url)))
}

/// Retrieves a single task by its ID.
///
/// Reads are open: any caller, anonymous included, may fetch any task.
///
/// ## Responses:
/// - `200 OK`: Returns the detail representation (no link fields).
/// - `404 Not Found`: If no task has this ID.
#[get("/{id}/")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = fetch_task(&pool, task_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task.to_detail_json()))
}

/// Replaces a task. Only the owner may do this.
///
/// A missing `complete` field resets the flag to false; this is a full
/// update, not a merge.
///
/// ## Responses:
/// - `200 OK`: Returns the updated detail representation.
/// - `400 Bad Request`: If validation on the payload fails.
/// - `401 Unauthorized`: If the request lacks a valid credential.
/// - `403 Forbidden`: If the caller does not own the task.
/// - `404 Not Found`: If no task has this ID.
#[put("/{id}/")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    user: AuthUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let task_uuid = task_id.into_inner();
    ensure_owner(&pool, task_uuid, user.0.profile_id).await?;

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks SET title = $1, complete = $2, updated_date = now()
         WHERE id = $3
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(&task_data.title)
    .bind(task_data.complete)
    .bind(task_uuid)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(task.to_detail_json()))
}

/// Partially updates a task. Only the owner may do this.
/// Fields left out of the payload keep their current value.
///
/// ## Responses: same as `update_task`.
#[patch("/{id}/")]
pub async fn patch_task(
    pool: web::Data<PgPool>,
    user: AuthUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskPatch>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let task_uuid = task_id.into_inner();
    ensure_owner(&pool, task_uuid, user.0.profile_id).await?;

    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks
         SET title = COALESCE($1, title), complete = COALESCE($2, complete), updated_date = now()
         WHERE id = $3
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(task_data.title.as_deref())
    .bind(task_data.complete)
    .bind(task_uuid)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(task.to_detail_json()))
}

/// Deletes a task. Only the owner may do this.
///
/// ## Responses:
/// - `204 No Content`: On successful deletion.
/// - `401 Unauthorized`: If the request lacks a valid credential.
/// - `403 Forbidden`: If the caller does not own the task.
/// - `404 Not Found`: If no task has this ID.
#[delete("/{id}/")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    user: AuthUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task_uuid = task_id.into_inner();
    ensure_owner(&pool, task_uuid, user.0.profile_id).await?;

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_uuid)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn fetch_task(pool: &PgPool, id: Uuid) -> Result<Task, AppError> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = $1",
        TASK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// 404 if the task does not exist, 403 if it belongs to someone else.
async fn ensure_owner(pool: &PgPool, id: Uuid, profile_id: i32) -> Result<(), AppError> {
    let owner = sqlx::query_scalar::<_, i32>("SELECT profile_id FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if owner != profile_id {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ));
    }
    Ok(())
}

enum PageToken {
    Number(i64),
    Last,
}

/// A page token is a 1-based number or the word `last`; an empty value reads
/// as page one. Anything else names a page that does not exist, so it is
/// answered 404 rather than 400.
fn parse_page(raw: Option<&str>) -> Result<PageToken, AppError> {
    match raw {
        None | Some("") => Ok(PageToken::Number(1)),
        Some("last") => Ok(PageToken::Last),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|page| *page >= 1)
            .map(PageToken::Number)
            .ok_or_else(|| AppError::NotFound("Invalid page.".into())),
    }
}

fn order_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("creation_date") => "creation_date ASC",
        // Unknown ordering values fall back to the default, newest first.
        _ => "creation_date DESC",
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

/// Exclusive upper bound that makes `to_date` inclusive of the whole day.
fn day_after(date: NaiveDate) -> DateTime<Utc> {
    day_start(date.succ_opt().unwrap_or(date))
}

fn request_base_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}", info.scheme(), info.host())
}

/// Rebuilds the current URL pointing at the given page, keeping every other
/// query parameter in place. The first page is addressed with no page
/// parameter at all.
fn page_url(req: &HttpRequest, page: i64) -> String {
    let mut params: Vec<String> = req
        .query_string()
        .split('&')
        .filter(|part| !part.is_empty() && !part.starts_with("page="))
        .map(str::to_string)
        .collect();
    if page > 1 {
        params.push(format!("page={}", page));
    }

    let base = format!("{}{}", request_base_url(req), req.path());
    if params.is_empty() {
        base
    } else {
        format!("{}?{}", base, params.join("&"))
    }
}
