//! MTA, upload and download handlers.

use crate::events::XcpObserver;
use crate::memory::{FlashAccessor, MemoryAccessor};
use crate::mta::{DOWNLOAD_MAX_SIZE, MAX_DOWNLOAD};
use crate::protocol::{ErrorCode, Frame, Request};
use crate::security::Resource;

use super::{CommandResult, HandlerContext};

/// SET_MTA - `[op, rsvd, rsvd, ext, addr(4)]`.
pub fn handle_set_mta<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let extension = req.byte(3)?;
    let address = req.u32_be(4)?;
    ctx.state.transfer.set_mta(address, extension);
    Ok(Frame::positive())
}

/// UPLOAD - `[op, count]`.
pub fn handle_upload<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let count = req.byte(1)? as usize;
    let data = ctx.state.transfer.upload(&*ctx.memory, count)?;
    let mut frame = Frame::positive();
    frame.extend_from_slice(&data);
    Ok(frame)
}

/// SHORT_UPLOAD - `[op, count, rsvd, ext, addr(4)]`.
pub fn handle_short_upload<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let count = req.byte(1)? as usize;
    let extension = req.byte(3)?;
    let address = req.u32_be(4)?;
    let data = ctx
        .state
        .transfer
        .short_upload(&*ctx.memory, address, extension, count)?;
    let mut frame = Frame::positive();
    frame.extend_from_slice(&data);
    Ok(frame)
}

/// DOWNLOAD - `[op, count, data(count)]`.
pub fn handle_download<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let count = req.byte(1)? as usize;
    if count > MAX_DOWNLOAD {
        return Err(ErrorCode::OutOfRange);
    }
    let data = req.payload(2, count)?;
    ctx.require(Resource::CalPag)?;
    ctx.state.transfer.download(&mut *ctx.memory, data)?;
    Ok(Frame::positive())
}

/// DOWNLOAD_MAX - `[op, data(7)]`.
pub fn handle_download_max<M: MemoryAccessor, F: FlashAccessor, O: XcpObserver>(
    req: &Request<'_>,
    ctx: &mut HandlerContext<'_, M, F, O>,
) -> CommandResult {
    let data = req.payload(1, DOWNLOAD_MAX_SIZE)?;
    ctx.require(Resource::CalPag)?;
    ctx.state.transfer.download_max(&mut *ctx.memory, data)?;
    Ok(Frame::positive())
}

/// SHORT_DOWNLOAD does not fit in a classic CAN frame.
pub fn handle_short_download() -> CommandResult {
    Err(ErrorCode::CmdSyntax)
}

#[cfg(test)]
mod tests {
    use crate::protocol::constants::*;
    use crate::state::handlers::tests::Harness;

    fn set_mta(address: u32) -> Vec<u8> {
        let mut frame = vec![CMD_SET_MTA, 0, 0, 0];
        frame.extend_from_slice(&address.to_be_bytes());
        frame
    }

    #[test]
    fn test_download_then_upload() {
        let mut h = Harness::connected();
        assert_eq!(h.send(&set_mta(0x0100)), vec![PID_RES]);
        assert_eq!(
            h.send(&[CMD_DOWNLOAD, 4, 0xAA, 0xBB, 0xCC, 0xDD]),
            vec![PID_RES]
        );
        assert_eq!(h.state.transfer.mta().address, 0x0104);

        h.send(&set_mta(0x0100));
        assert_eq!(
            h.send(&[CMD_UPLOAD, 4]),
            vec![PID_RES, 0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(h.state.transfer.mta().address, 0x0104);
    }

    #[test]
    fn test_short_upload_moves_mta() {
        let mut h = Harness::connected();
        h.send(&set_mta(0x0200));
        h.send(&[CMD_DOWNLOAD, 2, 0x12, 0x34]);
        assert_eq!(
            h.send(&[CMD_SHORT_UPLOAD, 2, 0, 0, 0, 0, 0x02, 0x00]),
            vec![PID_RES, 0x12, 0x34]
        );
        assert_eq!(h.state.transfer.mta().address, 0x0202);
    }

    #[test]
    fn test_download_limits() {
        let mut h = Harness::connected();
        assert_eq!(
            h.send(&[CMD_DOWNLOAD, 7, 1, 2, 3, 4, 5, 6]),
            vec![PID_ERR, ERR_OUT_OF_RANGE]
        );
        // count claims more bytes than the frame carries
        assert_eq!(h.send(&[CMD_DOWNLOAD, 3, 1]), vec![PID_ERR, ERR_CMD_SYNTAX]);
        assert_eq!(h.state.transfer.mta().address, 0);
        assert_eq!(
            h.send(&[CMD_SHORT_DOWNLOAD, 1, 0, 0, 0, 0, 0, 0]),
            vec![PID_ERR, ERR_CMD_SYNTAX]
        );
    }

    #[test]
    fn test_download_max() {
        let mut h = Harness::connected();
        h.send(&set_mta(0x0300));
        assert_eq!(
            h.send(&[CMD_DOWNLOAD_MAX, 1, 2, 3, 4, 5, 6, 7]),
            vec![PID_RES]
        );
        assert_eq!(h.ram.contents()[0x0300..0x0307], [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(h.state.transfer.mta().address, 0x0307);
        assert_eq!(h.send(&[CMD_DOWNLOAD_MAX, 1, 2]), vec![PID_ERR, ERR_CMD_SYNTAX]);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut h = Harness::connected();
        h.send(&set_mta(0x0000_FFFE));
        assert_eq!(h.send(&[CMD_UPLOAD, 4]), vec![PID_ERR, ERR_OUT_OF_RANGE]);
        // Failed read leaves the MTA where it was.
        assert_eq!(h.state.transfer.mta().address, 0xFFFE);
        assert_eq!(h.send(&[CMD_UPLOAD, 8]), vec![PID_ERR, ERR_OUT_OF_RANGE]);
        assert_eq!(
            h.send(&[CMD_DOWNLOAD, 4, 1, 2, 3, 4]),
            vec![PID_ERR, ERR_OUT_OF_RANGE]
        );
    }

    #[test]
    fn test_zero_length_upload() {
        let mut h = Harness::connected();
        h.send(&set_mta(0x0010));
        assert_eq!(h.send(&[CMD_UPLOAD, 0]), vec![PID_RES]);
        assert_eq!(h.state.transfer.mta().address, 0x0010);
    }
}
