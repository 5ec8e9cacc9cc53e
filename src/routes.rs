use std::sync::Arc;

use actix_web::{HttpResponse, Responder, guard, http::Method, web};

use crate::board::Board;
use crate::error::AppError;
use crate::gpio::GpioBackend;
use crate::hat::{Bank, HatDriver};
use crate::payload::{AuxPinsPayload, BankPayload, LocationPayload, parse_payload};

pub struct AppState<H: HatDriver, G: GpioBackend> {
    pub board: Arc<Board<H, G>>,
}

impl<H: HatDriver, G: GpioBackend> Clone for AppState<H, G> {
    fn clone(&self) -> Self {
        Self {
            board: Arc::clone(&self.board),
        }
    }
}

impl<H: HatDriver + 'static, G: GpioBackend + 'static> AppState<H, G> {
    pub fn api_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(
                web::resource("/location")
                    .route(web::post().to(post_location::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/outputpins")
                    .route(web::get().to(get_output_pins::<H, G>))
                    .route(web::post().to(post_output_pins::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET, Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/analog")
                    .route(web::get().to(get_analog::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/input")
                    .route(web::get().to(get_input::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/output")
                    .route(web::get().to(get_output::<H, G>))
                    .route(web::post().to(post_output::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET, Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/relay")
                    .route(web::get().to(get_relay::<H, G>))
                    .route(web::post().to(post_relay::<H, G>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET, Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
    }
}

async fn post_location<H: HatDriver + 'static, G: GpioBackend + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let payload: LocationPayload = parse_payload(&body);
    let porch = state.board.location(payload.location)?;

    Ok(web::Json(porch))
}

async fn get_output_pins<H: HatDriver + 'static, G: GpioBackend + 'static>(
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let pins = state.board.aux_pins()?;

    Ok(web::Json(pins))
}

async fn post_output_pins<H: HatDriver + 'static, G: GpioBackend + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let payload: AuxPinsPayload = parse_payload(&body);
    let pins = state.board.set_aux_pins(&payload)?;

    Ok(web::Json(pins))
}

async fn get_analog<H: HatDriver + 'static, G: GpioBackend + 'static>(
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let readings = state.board.analog()?;

    Ok(web::Json(readings))
}

async fn get_input<H: HatDriver + 'static, G: GpioBackend + 'static>(
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let levels = state.board.bank(Bank::Input)?;

    Ok(web::Json(levels))
}

async fn get_output<H: HatDriver + 'static, G: GpioBackend + 'static>(
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let levels = state.board.bank(Bank::Output)?;

    Ok(web::Json(levels))
}

async fn post_output<H: HatDriver + 'static, G: GpioBackend + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let payload: BankPayload = parse_payload(&body);
    let levels = state.board.set_bank(Bank::Output, &payload)?;

    Ok(web::Json(levels))
}

async fn get_relay<H: HatDriver + 'static, G: GpioBackend + 'static>(
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let levels = state.board.bank(Bank::Relay)?;

    Ok(web::Json(levels))
}

async fn post_relay<H: HatDriver + 'static, G: GpioBackend + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<H, G>>,
) -> Result<impl Responder, AppError> {
    let payload: BankPayload = parse_payload(&body);
    let levels = state.board.set_bank(Bank::Relay, &payload)?;

    Ok(web::Json(levels))
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
