//! Synthetic input requests and the seams to the OS injection layer

use serde::{Deserialize, Serialize};
use tracing::info;

/// One synthetic input event handed to the injection layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputRequest {
    KeyDown { vk: u16 },
    KeyUp { vk: u16 },
    /// Absolute move, coordinates already normalized to 0..=65535
    MoveTo { x: i32, y: i32 },
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
}

/// Outcome of one injection batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendReport {
    pub injected: usize,
    /// Platform error code sampled right after a short batch, 0 otherwise
    pub os_code: i32,
}

impl SendReport {
    pub fn complete(count: usize) -> Self {
        Self {
            injected: count,
            os_code: 0,
        }
    }
}

/// Accepts ordered batches of synthetic input and reports how many went through
pub trait Injector {
    fn send(&mut self, batch: &[InputRequest]) -> SendReport;
}

impl<T: Injector + ?Sized> Injector for &mut T {
    fn send(&mut self, batch: &[InputRequest]) -> SendReport {
        (**self).send(batch)
    }
}

impl<T: Injector + ?Sized> Injector for Box<T> {
    fn send(&mut self, batch: &[InputRequest]) -> SendReport {
        (**self).send(batch)
    }
}

/// Logs every request instead of injecting it
#[derive(Debug, Default)]
pub struct DryRunInjector {
    pub sent: usize,
}

impl Injector for DryRunInjector {
    fn send(&mut self, batch: &[InputRequest]) -> SendReport {
        for request in batch {
            info!(?request, "dry run");
        }
        self.sent += batch.len();
        SendReport::complete(batch.len())
    }
}

/// Live keyboard state, polled for the end key during playback
pub trait KeyState {
    fn is_down(&self, vk: u16) -> bool;
}

impl<F> KeyState for F
where
    F: Fn(u16) -> bool,
{
    fn is_down(&self, vk: u16) -> bool {
        self(vk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_reports_everything_sent() {
        let mut inj = DryRunInjector::default();
        let report = inj.send(&[InputRequest::LeftDown, InputRequest::LeftUp]);
        assert_eq!(report, SendReport::complete(2));
        assert_eq!(inj.sent, 2);
    }

    #[test]
    fn closures_act_as_key_state() {
        let state = |vk: u16| vk == 0x11;
        assert!(state.is_down(0x11));
        assert!(!state.is_down(0x10));
    }

    #[test]
    fn request_serializes_with_type_tag() {
        let v = serde_json::to_value(InputRequest::KeyDown { vk: 0x50 }).unwrap();
        assert_eq!(v["type"], "key_down");
        assert_eq!(v["vk"], 0x50);
    }
}
