use super::common::*;
use crate::use_cases::forms::{CreateFormInput, UpdateFormInput};

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_forms).post(create_form))
        .route("/{id}", patch(update_form).delete(delete_form))
        .route("/{id}/submissions", get(list_submissions))
}

async fn list_forms(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let forms = app_state.form_use_cases.list_forms(user_id).await?;
    Ok(Json(forms))
}

async fn create_form(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<CreateFormInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let form = app_state.form_use_cases.create_form(user_id, input).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

async fn update_form(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(form_id): Path<Uuid>,
    Json(input): Json<UpdateFormInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let form = app_state
        .form_use_cases
        .update_form(user_id, form_id, input)
        .await?;
    Ok(Json(form))
}

async fn delete_form(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(form_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user_id = current_user(&jar, &app_state)?;
    app_state.form_use_cases.delete_form(user_id, form_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_submissions(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(form_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let submissions = app_state
        .form_use_cases
        .list_submissions(user_id, form_id, page.limit, page.offset)
        .await?;
    Ok(Json(submissions))
}
