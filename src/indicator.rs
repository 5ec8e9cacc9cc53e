use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::hat::{HatDriver, Light};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs a callback once after a delay. Scheduled tasks are never cancelled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Spawns a sleeping task on the current actix/tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeScheduler;

impl Scheduler for RuntimeScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        actix_web::rt::spawn(async move {
            actix_web::rt::time::sleep(delay).await;
            task();
        });
    }
}

/// Activity pulse on the HAT's comms and warn lights.
///
/// Every call is a no-op when the HAT is absent. Light failures on a present
/// HAT are logged and swallowed.
pub struct Indicators<H: HatDriver> {
    hat: Arc<H>,
    present: bool,
    scheduler: Arc<dyn Scheduler>,
}

impl<H: HatDriver> Clone for Indicators<H> {
    fn clone(&self) -> Self {
        Self {
            hat: Arc::clone(&self.hat),
            present: self.present,
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<H: HatDriver + 'static> Indicators<H> {
    pub fn new(hat: Arc<H>, present: bool, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            hat,
            present,
            scheduler,
        }
    }

    pub fn power_on(&self) {
        self.set(Light::Power, 1);
    }

    pub fn signal_write(&self) {
        self.set(Light::Comms, 1);
        self.set(Light::Warn, 1);
    }

    pub fn signal_read(&self) {
        self.set(Light::Comms, 1);
    }

    pub fn schedule_off(&self, comms: Duration, warn: Option<Duration>) {
        if !self.present {
            return;
        }

        self.schedule_light_off(Light::Comms, comms);
        if let Some(delay) = warn {
            self.schedule_light_off(Light::Warn, delay);
        }
    }

    fn schedule_light_off(&self, light: Light, delay: Duration) {
        let hat = Arc::clone(&self.hat);
        self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Err(e) = hat.set_light(light, 0) {
                    warn!("failed to turn {light:?} light off: {e}");
                }
            }),
        );
    }

    fn set(&self, light: Light, value: u8) {
        if !self.present {
            return;
        }
        if let Err(e) = self.hat.set_light(light, value) {
            warn!("failed to set {light:?} light to {value}: {e}");
        }
    }
}
