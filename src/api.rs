//! Thin JSON controllers over [`Cinegraph`].

use crate::database::Storage;
use crate::error::Error;
use crate::model::*;
use crate::Cinegraph;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use log::{debug, error};
use serde::{Deserialize, Serialize};

type Core<S> = web::Data<Cinegraph<S>>;
type Response = Result<HttpResponse, Error>;

const DEFAULT_POPULAR_COUNT: i64 = 10;

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub description: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            // Unlinking a missing relation is reported, not failed.
            Error::FriendshipNotFound { .. } | Error::LikeNotFound { .. } => StatusCode::OK,
            Error::Storage(_) | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error, description) = match self {
            Error::Validation(_) => ("Validation error", self.to_string()),
            Error::NotFound(_) => ("Not found", self.to_string()),
            Error::FriendshipNotFound { .. } => ("Friendship not found", self.to_string()),
            Error::LikeNotFound { .. } => ("Like not found", self.to_string()),
            Error::Storage(_) | Error::Serialization(_) | Error::Internal(_) => {
                error!("{}", self);
                debug!("{:?}", self);
                ("Internal server error", "Internal server error".to_owned())
            }
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error.to_owned(),
            description,
        })
    }
}

#[derive(Deserialize)]
pub struct PopularParams {
    count: Option<i64>,
}

async fn get_users<S: Storage>(core: Core<S>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_users()?))
}

async fn add_user<S: Storage>(core: Core<S>, user: web::Json<User>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.create_user(user.into_inner())?))
}

async fn update_user<S: Storage>(core: Core<S>, user: web::Json<User>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.update_user(user.into_inner())?))
}

async fn get_user<S: Storage>(core: Core<S>, id: web::Path<UserId>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_user(id.into_inner())?))
}

async fn delete_user<S: Storage>(core: Core<S>, id: web::Path<UserId>) -> Response {
    core.entities.delete_user(id.into_inner())?;
    Ok(HttpResponse::Ok().finish())
}

async fn add_friend<S: Storage>(core: Core<S>, path: web::Path<(UserId, UserId)>) -> Response {
    let (id, friend_id) = path.into_inner();
    core.friends.add_friend(id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn confirm_friend<S: Storage>(core: Core<S>, path: web::Path<(UserId, UserId)>) -> Response {
    let (id, friend_id) = path.into_inner();
    core.friends.confirm_friendship(id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_friend<S: Storage>(core: Core<S>, path: web::Path<(UserId, UserId)>) -> Response {
    let (id, friend_id) = path.into_inner();
    core.friends.delete_friend(id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn get_friends<S: Storage>(core: Core<S>, id: web::Path<UserId>) -> Response {
    Ok(HttpResponse::Ok().json(core.friends.get_friends(id.into_inner())?))
}

async fn get_common_friends<S: Storage>(
    core: Core<S>,
    path: web::Path<(UserId, UserId)>,
) -> Response {
    let (id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(core.friends.get_common_friends(id, other_id)?))
}

async fn get_liked_films<S: Storage>(core: Core<S>, id: web::Path<UserId>) -> Response {
    Ok(HttpResponse::Ok().json(core.likes.liked_films(id.into_inner())?))
}

async fn get_films<S: Storage>(core: Core<S>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_films()?))
}

async fn add_film<S: Storage>(core: Core<S>, film: web::Json<Film>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.create_film(film.into_inner())?))
}

async fn update_film<S: Storage>(core: Core<S>, film: web::Json<Film>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.update_film(film.into_inner())?))
}

async fn get_film<S: Storage>(core: Core<S>, id: web::Path<FilmId>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_film(id.into_inner())?))
}

async fn delete_film<S: Storage>(core: Core<S>, id: web::Path<FilmId>) -> Response {
    core.entities.delete_film(id.into_inner())?;
    Ok(HttpResponse::Ok().finish())
}

async fn get_popular<S: Storage>(core: Core<S>, params: web::Query<PopularParams>) -> Response {
    let count = params.count.unwrap_or(DEFAULT_POPULAR_COUNT);
    Ok(HttpResponse::Ok().json(core.ranker.get_popular(count)?))
}

async fn add_like<S: Storage>(core: Core<S>, path: web::Path<(FilmId, UserId)>) -> Response {
    let (id, user_id) = path.into_inner();
    core.likes.add_like(id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn delete_like<S: Storage>(core: Core<S>, path: web::Path<(FilmId, UserId)>) -> Response {
    let (id, user_id) = path.into_inner();
    core.likes.delete_like(id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn get_likes<S: Storage>(core: Core<S>, id: web::Path<FilmId>) -> Response {
    Ok(HttpResponse::Ok().json(core.likes.likes_of(id.into_inner())?))
}

async fn get_mpa_ratings<S: Storage>(core: Core<S>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_mpa_ratings()?))
}

async fn get_mpa_rating<S: Storage>(core: Core<S>, id: web::Path<u64>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_mpa_rating(id.into_inner())?))
}

async fn get_genres<S: Storage>(core: Core<S>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_genres()?))
}

async fn get_genre<S: Storage>(core: Core<S>, id: web::Path<u64>) -> Response {
    Ok(HttpResponse::Ok().json(core.entities.get_genre(id.into_inner())?))
}

pub fn configure<S: Storage + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::get().to(get_users::<S>))
        .route("/users", web::post().to(add_user::<S>))
        .route("/users", web::put().to(update_user::<S>))
        .route("/users/{id}", web::get().to(get_user::<S>))
        .route("/users/{id}", web::delete().to(delete_user::<S>))
        .route("/users/{id}/friends", web::get().to(get_friends::<S>))
        .route(
            "/users/{id}/friends/common/{other_id}",
            web::get().to(get_common_friends::<S>),
        )
        .route(
            "/users/{id}/friends/{friend_id}",
            web::put().to(add_friend::<S>),
        )
        .route(
            "/users/{id}/friends/{friend_id}",
            web::delete().to(delete_friend::<S>),
        )
        .route(
            "/users/{id}/friends/{friend_id}/confirm",
            web::put().to(confirm_friend::<S>),
        )
        .route("/users/{id}/liked", web::get().to(get_liked_films::<S>))
        .route("/films", web::get().to(get_films::<S>))
        .route("/films", web::post().to(add_film::<S>))
        .route("/films", web::put().to(update_film::<S>))
        .route("/films/popular", web::get().to(get_popular::<S>))
        .route("/films/{id}", web::get().to(get_film::<S>))
        .route("/films/{id}", web::delete().to(delete_film::<S>))
        .route("/films/{id}/likes", web::get().to(get_likes::<S>))
        .route("/films/{id}/like/{user_id}", web::put().to(add_like::<S>))
        .route(
            "/films/{id}/like/{user_id}",
            web::delete().to(delete_like::<S>),
        )
        .route("/mpa", web::get().to(get_mpa_ratings::<S>))
        .route("/mpa/{id}", web::get().to(get_mpa_rating::<S>))
        .route("/genres", web::get().to(get_genres::<S>))
        .route("/genres/{id}", web::get().to(get_genre::<S>));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDb;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn app_data() -> web::Data<Cinegraph<MemoryDb>> {
        web::Data::new(Cinegraph::new(MemoryDb::new()))
    }

    fn user_json(login: &str) -> Value {
        json!({
            "email": format!("{}@example.com", login),
            "login": login,
            "birthday": "1990-01-10",
        })
    }

    fn film_json(name: &str) -> Value {
        json!({
            "name": name,
            "description": "",
            "releaseDate": "1999-03-31",
            "duration": 136,
            "mpa": { "id": 4 },
            "genres": [{ "id": 6 }],
        })
    }

    #[actix_rt::test]
    async fn users_and_friends() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .configure(configure::<MemoryDb>),
        )
        .await;

        for login in &["neo", "trinity"] {
            let req = test::TestRequest::post()
                .uri("/users")
                .set_json(user_json(login))
                .to_request();
            let user: User = test::call_and_read_body_json(&app, req).await;
            assert_eq!(user.name, *login);
        }

        let req = test::TestRequest::put().uri("/users/1/friends/2").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::put()
            .uri("/users/2/friends/1/confirm")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/users/2/friends").to_request();
        let friends: Vec<User> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].login, "neo");

        let req = test::TestRequest::put().uri("/users/1/friends/1").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::delete()
            .uri("/users/1/friends/2")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        // A second delete is a soft failure: 200 with an error body.
        let req = test::TestRequest::delete()
            .uri("/users/1/friends/2")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Friendship not found");

        let req = test::TestRequest::get().uri("/users/9").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_rt::test]
    async fn null_name_falls_back_to_login() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .configure(configure::<MemoryDb>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(json!({
                "email": "a@b.c",
                "login": "neo",
                "name": null,
                "birthday": "1990-01-10",
            }))
            .to_request();
        let user: User = test::call_and_read_body_json(&app, req).await;
        assert_eq!(user.name, "neo");

        let req = test::TestRequest::put()
            .uri("/users")
            .set_json(json!({
                "id": user.id,
                "email": "a@b.c",
                "login": "anderson",
                "name": null,
                "birthday": "1990-01-10",
            }))
            .to_request();
        let user: User = test::call_and_read_body_json(&app, req).await;
        assert_eq!(user.name, "anderson");

        let mut film = film_json("The Matrix");
        film["description"] = Value::Null;
        let req = test::TestRequest::post()
            .uri("/films")
            .set_json(film)
            .to_request();
        let film: Film = test::call_and_read_body_json(&app, req).await;
        assert_eq!(film.description, "");
    }

    #[actix_rt::test]
    async fn films_likes_and_popular() {
        let app = test::init_service(
            App::new()
                .app_data(app_data())
                .configure(configure::<MemoryDb>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(user_json("neo"))
            .to_request();
        let user: User = test::call_and_read_body_json(&app, req).await;
        for name in &["The Matrix", "Dark City"] {
            let req = test::TestRequest::post()
                .uri("/films")
                .set_json(film_json(name))
                .to_request();
            let film: Film = test::call_and_read_body_json(&app, req).await;
            assert_eq!(film.mpa.name, "R");
            assert_eq!(film.genres[0].name, "Action");
        }

        let req = test::TestRequest::put()
            .uri(&format!("/films/2/like/{}", user.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/films/popular?count=1")
            .to_request();
        let popular: Vec<Film> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].name, "Dark City");

        let req = test::TestRequest::get().uri("/films/popular").to_request();
        let popular: Vec<Film> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(popular.len(), 2);

        let req = test::TestRequest::get()
            .uri("/films/popular?count=0")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::delete()
            .uri(&format!("/films/1/like/{}", user.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Like not found");

        let mut early = film_json("Too early");
        early["releaseDate"] = json!("1890-01-01");
        let req = test::TestRequest::post()
            .uri("/films")
            .set_json(early)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::get().uri("/mpa/3").to_request();
        let rating: MpaRating = test::call_and_read_body_json(&app, req).await;
        assert_eq!(rating.name, "PG-13");
        let req = test::TestRequest::get().uri("/genres/42").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
