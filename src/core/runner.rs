//! # Run one provider until it returns.
//!
//! Drives [`Provider::run`](crate::Provider::run) with the application's run
//! token and publishes its lifecycle to the [`Bus`].
//!
//! ```text
//! Success / cancellation:
//!   publish ProviderStarting → provider.run() → Ok | Err(Canceled) → publish ProviderStopped
//!
//! Failure:
//!   publish ProviderStarting → provider.run() → Err(Fail/Exit)     → publish ProviderFailed
//!
//! Panic:
//!   publish ProviderStarting → provider.run() panics → Err(Panicked) → publish ProviderFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event
//! - `Canceled` is a graceful exit
//! - Panics are caught and turned into [`ProviderError::Panicked`]

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::events::{Bus, Event, EventKind};
use crate::providers::ProviderRef;
use crate::subscribers::panic_message;

pub(crate) async fn run_provider(
    id: &str,
    provider: ProviderRef,
    token: CancellationToken,
    bus: &Bus,
) -> Result<(), ProviderError> {
    bus.publish(Event::new(EventKind::ProviderStarting).with_provider(id));

    let res = match AssertUnwindSafe(provider.run(token)).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(ProviderError::Panicked {
            info: panic_message(payload.as_ref()),
        }),
    };

    match &res {
        Ok(()) | Err(ProviderError::Canceled) => {
            bus.publish(Event::new(EventKind::ProviderStopped).with_provider(id));
        }
        Err(e) => {
            bus.publish(
                Event::new(EventKind::ProviderFailed)
                    .with_provider(id)
                    .with_reason(e.to_string()),
            );
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderFn;

    fn drain_kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn canceled_is_a_graceful_stop() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        token.cancel();

        let provider = ProviderFn::arc(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(ProviderError::Canceled)
        });
        let res = run_provider("p", provider, token, &bus).await;

        assert!(matches!(res, Err(ProviderError::Canceled)));
        assert_eq!(
            drain_kinds(&mut rx),
            vec![EventKind::ProviderStarting, EventKind::ProviderStopped]
        );
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        let provider = ProviderFn::arc(|_ctx: CancellationToken| async move {
            if true {
                panic!("exploded");
            }
            Ok::<(), ProviderError>(())
        });
        let res = run_provider("p", provider, CancellationToken::new(), &bus).await;

        match res {
            Err(ProviderError::Panicked { info }) => assert_eq!(info, "exploded"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            drain_kinds(&mut rx),
            vec![EventKind::ProviderStarting, EventKind::ProviderFailed]
        );
    }
}
