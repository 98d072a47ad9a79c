//! Encoding output: delta commands written through the tube.

use crate::error::Result;
use crate::signature::DELTA_MAGIC;
use crate::stats::JobStats;
use crate::stream::Tube;

use super::command::{OP_COPY_N1_N1, OP_COPY_N2_N1, OP_COPY_N4_N1, OP_COPY_N8_N1, OP_END, OP_LITERAL_N1};
use super::netint::{int_len, squirt_byte, squirt_n4, squirt_netint};

pub(crate) fn emit_delta_header(tube: &mut Tube) -> Result<()> {
    tracing::trace!("emit DELTA magic");
    squirt_n4(tube, DELTA_MAGIC)
}

/// Write a LITERAL command header for `len` payload bytes, using the
/// smallest length encoding. The payload itself follows through the tube's
/// copy machinery.
pub(crate) fn emit_literal_cmd(tube: &mut Tube, stats: &mut JobStats, len: u64) -> Result<()> {
    let param_len = int_len(len);
    // 0x41 / 0x42 / 0x43 / 0x44 for widths 1 / 2 / 4 / 8.
    let cmd = OP_LITERAL_N1 + (param_len.trailing_zeros() as u8).min(3);

    tracing::trace!(len, cmd, "emit LITERAL");
    squirt_byte(tube, cmd)?;
    squirt_netint(tube, len, param_len)?;

    stats.lit_cmds += 1;
    stats.lit_bytes += len;
    stats.lit_cmdbytes += 1 + param_len as u64;
    Ok(())
}

/// Write a COPY command for `pos` and `len`, choosing the narrowest widths
/// for each parameter.
pub(crate) fn emit_copy_cmd(tube: &mut Tube, stats: &mut JobStats, pos: u64, len: u64) -> Result<()> {
    let pos_bytes = int_len(pos);
    let len_bytes = int_len(len);

    let base = match pos_bytes {
        1 => OP_COPY_N1_N1,
        2 => OP_COPY_N2_N1,
        4 => OP_COPY_N4_N1,
        _ => OP_COPY_N8_N1,
    };
    let cmd = base + (len_bytes.trailing_zeros() as u8).min(3);

    tracing::trace!(pos, len, cmd, "emit COPY");
    squirt_byte(tube, cmd)?;
    squirt_netint(tube, pos, pos_bytes)?;
    squirt_netint(tube, len, len_bytes)?;

    stats.copy_cmds += 1;
    stats.copy_bytes += len;
    stats.copy_cmdbytes += 1 + pos_bytes as u64 + len_bytes as u64;
    Ok(())
}

pub(crate) fn emit_end_cmd(tube: &mut Tube) -> Result<()> {
    tracing::trace!("emit END");
    squirt_byte(tube, OP_END)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::Buffers;
    use crate::stream::Scoop;

    fn drain(tube: &mut Tube) -> Vec<u8> {
        let mut scoop = Scoop::new();
        let mut out = [0u8; 64];
        let mut io = Buffers::new(b"", false, &mut out);
        tube.catchup(&mut scoop, &mut io).unwrap();
        let n = io.produced();
        out[..n].to_vec()
    }

    #[test]
    fn test_literal_widths() {
        let mut stats = JobStats::default();

        let mut tube = Tube::new();
        emit_literal_cmd(&mut tube, &mut stats, 5).unwrap();
        assert_eq!(drain(&mut tube), vec![0x41, 5]);

        let mut tube = Tube::new();
        emit_literal_cmd(&mut tube, &mut stats, 0x1234).unwrap();
        assert_eq!(drain(&mut tube), vec![0x42, 0x12, 0x34]);

        let mut tube = Tube::new();
        emit_literal_cmd(&mut tube, &mut stats, 0x0001_0000).unwrap();
        assert_eq!(drain(&mut tube), vec![0x43, 0x00, 0x01, 0x00, 0x00]);

        assert_eq!(stats.lit_cmds, 3);
        assert_eq!(stats.lit_cmdbytes, 2 + 3 + 5);
    }

    #[test]
    fn test_copy_widths() {
        let mut stats = JobStats::default();

        let mut tube = Tube::new();
        emit_copy_cmd(&mut tube, &mut stats, 0, 16).unwrap();
        assert_eq!(drain(&mut tube), vec![0x45, 0, 16]);

        let mut tube = Tube::new();
        emit_copy_cmd(&mut tube, &mut stats, 0x300, 0x2_0000).unwrap();
        assert_eq!(drain(&mut tube), vec![0x4b, 0x03, 0x00, 0x00, 0x02, 0x00, 0x00]);

        assert_eq!(stats.copy_bytes, 16 + 0x2_0000);
    }

    #[test]
    fn test_end_is_one_zero_byte() {
        let mut tube = Tube::new();
        emit_end_cmd(&mut tube).unwrap();
        assert_eq!(drain(&mut tube), vec![0x00]);
    }
}
