use enumflags2::bitflags;

#[repr(C)]
#[derive(Debug, Default)]
pub struct Stat {
    pub dev: u64,
    pub inode: u64,
    pub kind: StatKind,
    pad: [u64; 7],
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

impl Stat {
    #[inline]
    pub fn new(inode: u64, kind: StatKind) -> Self {
        Self {
            dev: 0,
            inode,
            kind,
            pad: Default::default(),
        }
    }
}
