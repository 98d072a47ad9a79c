//! Delta command bytes and the prototable.
//!
//! Every possible command byte maps to a prototable row giving its kind, an
//! implied literal length (for the inline short-literal forms), and the
//! widths of the parameters that follow. The decoder drives off this table;
//! the encoder only ever emits END, the explicit-length LITERAL forms, and
//! the COPY family.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    End,
    Literal,
    Copy,
    Reserved,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CmdEntry {
    pub kind: Kind,
    /// Implied literal length when no length parameter follows.
    pub immediate: u8,
    /// Width of the first parameter (0 = none).
    pub len1: u8,
    /// Width of the second parameter (0 = none).
    pub len2: u8,
}

pub(crate) const OP_END: u8 = 0x00;
/// Explicit-length literals: length in 1, 2, 4 or 8 following bytes.
pub(crate) const OP_LITERAL_N1: u8 = 0x41;
pub(crate) const OP_LITERAL_N2: u8 = 0x42;
pub(crate) const OP_LITERAL_N4: u8 = 0x43;
pub(crate) const OP_LITERAL_N8: u8 = 0x44;
/// COPY with (offset width, length width) pairs ascending (1,1)..(8,8).
pub(crate) const OP_COPY_N1_N1: u8 = 0x45;
pub(crate) const OP_COPY_N2_N1: u8 = 0x49;
pub(crate) const OP_COPY_N4_N1: u8 = 0x4d;
pub(crate) const OP_COPY_N8_N1: u8 = 0x51;
pub(crate) const OP_COPY_N8_N8: u8 = 0x54;

const fn entry(kind: Kind, immediate: u8, len1: u8, len2: u8) -> CmdEntry {
    CmdEntry {
        kind,
        immediate,
        len1,
        len2,
    }
}

const fn build_prototab() -> [CmdEntry; 256] {
    let mut tab = [entry(Kind::Reserved, 0, 0, 0); 256];
    tab[OP_END as usize] = entry(Kind::End, 0, 0, 0);

    // 0x01..=0x40 carry their literal length in the command byte itself.
    let mut op = 0x01;
    while op <= 0x40 {
        tab[op] = entry(Kind::Literal, op as u8, 0, 0);
        op += 1;
    }

    tab[OP_LITERAL_N1 as usize] = entry(Kind::Literal, 0, 1, 0);
    tab[OP_LITERAL_N2 as usize] = entry(Kind::Literal, 0, 2, 0);
    tab[OP_LITERAL_N4 as usize] = entry(Kind::Literal, 0, 4, 0);
    tab[OP_LITERAL_N8 as usize] = entry(Kind::Literal, 0, 8, 0);

    let widths = [1u8, 2, 4, 8];
    let mut off = 0;
    while off < 4 {
        let mut len = 0;
        while len < 4 {
            tab[OP_COPY_N1_N1 as usize + off * 4 + len] =
                entry(Kind::Copy, 0, widths[off], widths[len]);
            len += 1;
        }
        off += 1;
    }

    tab
}

pub(crate) static PROTOTAB: [CmdEntry; 256] = build_prototab();

/// Human-readable kind name, for tracing.
pub(crate) fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::End => "END",
        Kind::Literal => "LITERAL",
        Kind::Copy => "COPY",
        Kind::Reserved => "RESERVED",
    }
}
