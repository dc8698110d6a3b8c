//! Seed/key handlers.

use crate::events::{XcpEvent, XcpObserver};
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::protocol::{ErrorCode, Frame, Request};
use crate::security::Resource;

use super::{CommandResult, HandlerContext};

/// GET_SEED - `[op, mode]`, mode selects the resource.
pub fn handle_get_seed<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let mode = req.byte(1)?;
    let resource = Resource::from_seed_mode(mode).ok_or(ErrorCode::OutOfRange)?;

    let seed = ctx.state.security.get_seed(resource);
    if !seed.is_empty() {
        ctx.emit(XcpEvent::SeedIssued { resource });
    }

    let mut frame = Frame::positive();
    frame.push(seed.len() as u8).extend_from_slice(&seed);
    Ok(frame)
}

/// UNLOCK - `[op, keyLen, key]`.
pub fn handle_unlock<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let key_len = req.byte(1)? as usize;
    let key = req.payload(2, key_len)?;

    let Some(resource) = ctx.state.security.pending_resource() else {
        ctx.emit(XcpEvent::UnlockFailed { resource: None });
        return Err(ErrorCode::Sequence);
    };

    if ctx.state.security.unlock(key) {
        ctx.emit(XcpEvent::Unlocked { resource });
        Ok(Frame::positive())
    } else {
        ctx.emit(XcpEvent::UnlockFailed {
            resource: Some(resource),
        });
        Err(ErrorCode::AccessLocked)
    }
}

#[cfg(test)]
mod tests {
    use crate::events::XcpEvent;
    use crate::protocol::constants::*;
    use crate::security::{Resource, SecurityConfig, compute_key};
    use crate::state::handlers::tests::Harness;

    const SECRET: u32 = 0x1234_5678;

    fn locked() -> Harness {
        let mut h = Harness::with_security(SecurityConfig {
            enabled: true,
            protect_daq: true,
            secret_key: SECRET,
            rng_seed: Some(42),
            ..Default::default()
        });
        h.send(&[CMD_CONNECT, 0]);
        h
    }

    fn unlock_frame(key: &[u8]) -> Vec<u8> {
        let mut frame = vec![CMD_UNLOCK, key.len() as u8];
        frame.extend_from_slice(key);
        frame
    }

    #[test]
    fn test_seed_and_unlock() {
        let mut h = locked();
        let seed = h.send(&[CMD_GET_SEED, 0]);
        assert_eq!(seed[0], PID_RES);
        assert_eq!(seed[1], 4);
        assert_eq!(seed.len(), 6);

        let key = compute_key(&seed[2..6], SECRET);
        assert_eq!(h.send(&unlock_frame(&key)), vec![PID_RES]);
        assert!(h.state.security.is_unlocked(Resource::CalPag));
        assert!(!h.state.security.is_unlocked(Resource::Pgm));

        // Already unlocked: zero-length seed.
        assert_eq!(h.send(&[CMD_GET_SEED, 0]), vec![PID_RES, 0]);

        let events = h.observer.events();
        assert!(events.contains(&XcpEvent::SeedIssued {
            resource: Resource::CalPag
        }));
        assert!(events.contains(&XcpEvent::Unlocked {
            resource: Resource::CalPag
        }));
    }

    #[test]
    fn test_wrong_key_keeps_lock() {
        let mut h = locked();
        h.send(&[CMD_GET_SEED, 3]);
        assert_eq!(
            h.send(&unlock_frame(&[0, 0, 0, 0])),
            vec![PID_ERR, ERR_ACCESS_LOCKED]
        );
        assert!(!h.state.security.is_unlocked(Resource::Pgm));
        assert_eq!(h.state.security.pending_resource(), Some(Resource::Pgm));
        assert!(h.observer.events().contains(&XcpEvent::UnlockFailed {
            resource: Some(Resource::Pgm)
        }));
    }

    #[test]
    fn test_unlock_without_seed() {
        let mut h = locked();
        assert_eq!(
            h.send(&unlock_frame(&[1, 2, 3, 4])),
            vec![PID_ERR, ERR_SEQUENCE]
        );
    }

    #[test]
    fn test_invalid_mode_and_truncated_key() {
        let mut h = locked();
        assert_eq!(h.send(&[CMD_GET_SEED, 4]), vec![PID_ERR, ERR_OUT_OF_RANGE]);
        assert_eq!(h.send(&[CMD_GET_SEED]), vec![PID_ERR, ERR_CMD_SYNTAX]);

        h.send(&[CMD_GET_SEED, 0]);
        // keyLen claims 4 but only 2 bytes follow
        assert_eq!(h.send(&[CMD_UNLOCK, 4, 1, 2]), vec![PID_ERR, ERR_CMD_SYNTAX]);
        assert_eq!(h.state.security.pending_resource(), Some(Resource::CalPag));
    }

    #[test]
    fn test_disconnect_relocks() {
        let mut h = locked();
        let seed = h.send(&[CMD_GET_SEED, 1]);
        let key = compute_key(&seed[2..6], SECRET);
        h.send(&unlock_frame(&key));
        assert!(h.state.security.is_unlocked(Resource::Daq));

        h.send(&[CMD_DISCONNECT]);
        h.send(&[CMD_CONNECT, 0]);
        assert!(!h.state.security.is_unlocked(Resource::Daq));
    }
}
