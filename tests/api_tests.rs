use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actix_web::{App, test, web};
use hatrest::{
    AppConfig, AppError, AppState, Board, ChannelIndex, Direction, GpioBackend, Light,
    MockGpioBackend, MockHat, Scheduler, Task,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Fake clock: scheduled tasks run only when the test advances time.
#[derive(Default)]
struct ManualClock {
    now: Mutex<Duration>,
    pending: Mutex<Vec<(Duration, Task)>>,
}

impl Scheduler for ManualClock {
    fn schedule(&self, delay: Duration, task: Task) {
        let due = *self.now.lock() + delay;
        self.pending.lock().push((due, task));
    }
}

impl ManualClock {
    fn advance(&self, by: Duration) {
        let now = {
            let mut now = self.now.lock();
            *now += by;
            *now
        };
        let ready: Vec<(Duration, Task)> = {
            let mut pending = self.pending.lock();
            let (ready, rest): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(due, _)| *due <= now);
            *pending = rest;
            ready
        };
        for (_, task) in ready {
            task();
        }
    }

    fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Line backend whose reads can be switched to fail after writes succeed.
#[derive(Default)]
struct FaultyReadGpio {
    inner: MockGpioBackend,
    fail_reads: AtomicBool,
}

impl GpioBackend for FaultyReadGpio {
    fn configure(&self, line: u32, direction: Direction, initial: u8) -> Result<(), AppError> {
        self.inner.configure(line, direction, initial)
    }

    fn read_value(&self, line: u32) -> Result<u8, AppError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(AppError::Gpio(format!("read line {line}: device gone")));
        }
        self.inner.read_value(line)
    }

    fn write_value(&self, line: u32, value: u8) -> Result<(), AppError> {
        self.inner.write_value(line, value)
    }
}

struct Rig {
    hat: Arc<MockHat>,
    gpio: Arc<MockGpioBackend>,
    clock: Arc<ManualClock>,
    state: AppState<MockHat, MockGpioBackend>,
}

fn rig(present: bool) -> Rig {
    let cfg = AppConfig::default();
    let hat = Arc::new(MockHat::new(present));
    let gpio = Arc::new(MockGpioBackend::default());
    let clock = Arc::new(ManualClock::default());
    let board = Board::new(&cfg, hat.clone(), gpio.clone(), clock.clone()).expect("board");
    Rig {
        hat,
        gpio,
        clock,
        state: AppState {
            board: Arc::new(board),
        },
    }
}

#[actix_rt::test]
async fn location_drives_porch_light() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/location")
        .set_json(json!({"location": "entered"}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 1}));

    let req = test::TestRequest::post()
        .uri("/api/location")
        .set_json(json!({"location": "foo"}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 1}));

    let req = test::TestRequest::post()
        .uri("/api/location")
        .set_json(json!({"location": "exited"}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 0}));

    let req = test::TestRequest::get().uri("/api/outputpins").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["porchLight"], 0);
}

#[actix_rt::test]
async fn output_pins_partial_update() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/outputpins")
        .set_json(json!({"porchLight": 1, "spare2": "1"}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 1, "spare1": 0, "spare2": 1}));

    let req = test::TestRequest::post()
        .uri("/api/outputpins")
        .set_json(json!({"spare1": "on"}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 1, "spare1": 1, "spare2": 1}));

    let req = test::TestRequest::post()
        .uri("/api/outputpins")
        .set_json(json!({"porchLight": "off", "spare1": "bogus", "spare2": true}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 0, "spare1": 1, "spare2": 1}));

    let req = test::TestRequest::get().uri("/api/outputpins").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"porchLight": 0, "spare1": 1, "spare2": 1}));
}

#[actix_rt::test]
async fn hat_resources_fail_when_absent() {
    let rig = rig(false);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    for uri in ["/api/analog", "/api/input", "/api/output", "/api/relay"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Automation Hat not found!"}));
    }

    for uri in ["/api/output", "/api/relay"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .set_json(json!({"one": 1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Automation Hat not found!"}));
    }

    assert_eq!(rig.hat.light_writes(), 0);
}

#[actix_rt::test]
async fn aux_pins_work_without_hat() {
    let rig = rig(false);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/location")
        .set_json(json!({"location": "entered"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"porchLight": 1}));
}

#[actix_rt::test]
async fn hat_reads_report_hardware_values() {
    let rig = rig(true);
    rig.hat.set_input(ChannelIndex::Two, 1);
    rig.hat.set_analog(ChannelIndex::One, 12.5);
    rig.hat.set_analog(ChannelIndex::Three, 0.25);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/input").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"one": 0, "two": 1, "three": 0}));

    let req = test::TestRequest::get().uri("/api/analog").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"one": 12.5, "two": 0.0, "three": 0.25}));

    let req = test::TestRequest::get().uri("/api/relay").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"one": 0, "two": 0, "three": 0}));
}

#[actix_rt::test]
async fn bank_writes_are_idempotent() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    for uri in ["/api/output", "/api/relay"] {
        let mut seen = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(json!({"one": "on", "three": "1", "two": "off"}))
                .to_request();
            let resp: Value = test::call_and_read_body_json(&app, req).await;
            seen.push(resp);
        }
        assert_eq!(seen[0], json!({"one": 1, "two": 0, "three": 1}), "{uri}");
        assert_eq!(seen[0], seen[1], "{uri}");

        let req = test::TestRequest::get().uri(uri).to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, seen[1]);
    }
}

#[actix_rt::test]
async fn malformed_body_changes_nothing() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/relay")
        .set_json(json!({"one": 1}))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["one"], 1);

    for payload in ["garbage", "[1,2]", ""] {
        let req = test::TestRequest::post()
            .uri("/api/relay")
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "{payload:?}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"one": 1, "two": 0, "three": 0}));
    }
}

#[actix_rt::test]
async fn write_pulses_both_indicators() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/output")
        .set_json(json!({"two": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(rig.hat.light(Light::Comms), 1);
    assert_eq!(rig.hat.light(Light::Warn), 1);

    rig.clock.advance(Duration::from_millis(499));
    assert_eq!(rig.hat.light(Light::Comms), 1);

    rig.clock.advance(Duration::from_millis(1));
    assert_eq!(rig.hat.light(Light::Comms), 0);
    assert_eq!(rig.hat.light(Light::Warn), 1);

    rig.clock.advance(Duration::from_millis(500));
    assert_eq!(rig.hat.light(Light::Warn), 0);
    assert_eq!(rig.hat.light(Light::Power), 1);
}

#[actix_rt::test]
async fn read_pulses_comms_only() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/input").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    assert_eq!(rig.hat.light(Light::Comms), 1);
    assert_eq!(rig.hat.light(Light::Warn), 0);

    rig.clock.advance(Duration::from_millis(500));
    assert_eq!(rig.hat.light(Light::Comms), 0);
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let rig = rig(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/location").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);

    for uri in ["/api/analog", "/api/input"] {
        let req = test::TestRequest::post().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 405, "{uri}");
    }

    let req = test::TestRequest::delete().uri("/api/relay").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
}

#[actix_rt::test]
async fn bootstrap_claims_aux_lines_low() {
    for present in [true, false] {
        let rig = rig(present);
        for line in [17, 27, 22] {
            assert_eq!(rig.gpio.direction(line), Some(Direction::Output));
        }
        assert_eq!(rig.hat.light(Light::Power), u8::from(present));
        assert_eq!(rig.state.board.is_present(), present);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(rig.state.clone()))
                .service(rig.state.api_scope("/api")),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/outputpins").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, json!({"porchLight": 0, "spare1": 0, "spare2": 0}));
    }
}

#[actix_rt::test]
async fn failed_read_back_returns_500_and_still_schedules_off() {
    let cfg = AppConfig::default();
    let hat = Arc::new(MockHat::new(true));
    let gpio = Arc::new(FaultyReadGpio::default());
    let clock = Arc::new(ManualClock::default());
    let board = Board::new(&cfg, hat.clone(), gpio.clone(), clock.clone()).expect("board");
    let state = AppState {
        board: Arc::new(board),
    };

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope("/api")),
    )
    .await;

    gpio.fail_reads.store(true, Ordering::Relaxed);
    let req = test::TestRequest::post()
        .uri("/api/outputpins")
        .set_json(json!({"spare1": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "GPIO error: read line 17: device gone"}));

    assert_eq!(hat.light(Light::Comms), 1);
    assert_eq!(hat.light(Light::Warn), 1);
    assert_eq!(clock.pending(), 2);

    clock.advance(Duration::from_secs(1));
    assert_eq!(hat.light(Light::Comms), 0);
    assert_eq!(hat.light(Light::Warn), 0);

    // the write landed before the read-back failed
    gpio.fail_reads.store(false, Ordering::Relaxed);
    assert_eq!(gpio.read_value(27).unwrap(), 1);
}

#[actix_rt::test]
async fn light_failures_do_not_fail_requests() {
    let rig = rig(true);
    rig.hat.set_fail_lights(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(rig.state.clone()))
            .service(rig.state.api_scope("/api")),
    )
    .await;

    let writes_before = rig.hat.light_writes();
    let req = test::TestRequest::post()
        .uri("/api/relay")
        .set_json(json!({"two": "on"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"one": 0, "two": 1, "three": 0}));

    rig.clock.advance(Duration::from_secs(1));
    assert_eq!(rig.hat.light_writes(), writes_before + 4);
    assert_eq!(rig.hat.light(Light::Comms), 0);
    assert_eq!(rig.hat.light(Light::Warn), 0);

    let req = test::TestRequest::get().uri("/api/relay").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, json!({"one": 0, "two": 1, "three": 0}));
}
