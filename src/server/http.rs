use actix::Addr;
use actix_web::web::{delete, get, post, Data, Json, Path, Payload};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use serde::Deserialize;

use crate::config::Config;
use crate::room::manager::{CreateRoom, DeleteRoom, GetRoomInfo, GetSummary, ListRooms, RoomManager};
use crate::session::actor::Session;

async fn websocket(
    req: HttpRequest,
    payload: Payload,
    manager: Data<Addr<RoomManager>>,
) -> actix_web::Result<HttpResponse> {
    ws::start(Session::new(manager.get_ref().clone()), &req, payload)
}

async fn summary(manager: Data<Addr<RoomManager>>) -> actix_web::Result<HttpResponse> {
    let summary = manager
        .send(GetSummary)
        .await
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;
    Ok(HttpResponse::Ok().json(summary))
}

async fn list_rooms(manager: Data<Addr<RoomManager>>) -> actix_web::Result<HttpResponse> {
    let rooms = manager
        .send(ListRooms)
        .await
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;
    Ok(HttpResponse::Ok().json(rooms))
}

#[derive(Deserialize)]
struct RoomCreationRequest {
    max_clients: i32,
}

async fn create_room(
    manager: Data<Addr<RoomManager>>,
    request: Json<RoomCreationRequest>,
) -> actix_web::Result<HttpResponse> {
    let result = manager
        .send(CreateRoom {
            max_clients: request.max_clients,
        })
        .await
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;
    match result {
        Ok(info) => Ok(HttpResponse::Ok().json(info)),
        Err(err) => Err(err.into()),
    }
}

async fn get_room(
    manager: Data<Addr<RoomManager>>,
    room_id: Path<i32>,
) -> actix_web::Result<HttpResponse> {
    let info = manager
        .send(GetRoomInfo {
            id: room_id.into_inner(),
        })
        .await
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;
    match info {
        Some(info) => Ok(HttpResponse::Ok().json(info)),
        None => Err(actix_web::error::ErrorNotFound("no matching room found")),
    }
}

async fn delete_room(
    manager: Data<Addr<RoomManager>>,
    room_id: Path<i32>,
) -> actix_web::Result<HttpResponse> {
    let result = manager
        .send(DeleteRoom {
            id: room_id.into_inner(),
        })
        .await
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.to_string()))?;
    match result {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(err) => Err(err.into()),
    }
}

/// Starts the HTTP server: the `/v1/websocket` upgrade plus the
/// `/v1/api/*` admin surface (spec §6).
pub async fn start(config: Config) -> std::io::Result<()> {
    let manager = RoomManager::new(config.max_clients, config.commit_rounding).start();
    let bind_address = config.bind_address();

    log::info!("Starting API over HTTP on {bind_address}");

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(manager.clone()))
            .route("/v1/websocket", get().to(websocket))
            .route("/v1/api/summary", get().to(summary))
            .route("/v1/api/rooms", get().to(list_rooms))
            .route("/v1/api/rooms", post().to(create_room))
            .route("/v1/api/rooms/{room_id}", get().to(get_room))
            .route("/v1/api/rooms/{room_id}", delete().to(delete_room))
    })
    .bind(bind_address)?
    .run()
    .await
}
