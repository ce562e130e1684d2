//! `HugePageSize`: the system's default huge-page size, or zero if
//! unknown. The arena falls back to 2 MiB when this returns zero.

/// Default huge-page size, bytes.
pub const DEFAULT_HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Reports the system's default huge-page size.
pub trait HugePageSize: Send + Sync {
    /// Bytes per huge page, or `0` if unknown.
    fn huge_page_size(&self) -> usize;
}

/// Always reports unknown (`0`); the arena falls back to the 2 MiB
/// default. Used on non-Linux targets and as the default without the
/// `numa` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownHugePageSize;

impl HugePageSize for UnknownHugePageSize {
    fn huge_page_size(&self) -> usize {
        0
    }
}

/// Resolves a huge-page size once and returns it thereafter.
#[derive(Debug, Clone, Copy)]
pub struct FixedHugePageSize(pub usize);

impl HugePageSize for FixedHugePageSize {
    fn huge_page_size(&self) -> usize {
        self.0
    }
}

#[cfg(feature = "numa")]
mod linux {
    use super::HugePageSize;
    use std::io::BufRead;

    /// Parses `Hugepagesize:` out of `/proc/meminfo`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinuxHugePageSize;

    impl HugePageSize for LinuxHugePageSize {
        fn huge_page_size(&self) -> usize {
            read_meminfo_hugepage_size().unwrap_or(0)
        }
    }

    fn read_meminfo_hugepage_size() -> Option<usize> {
        let file = std::fs::File::open("/proc/meminfo").ok()?;
        let reader = std::io::BufReader::new(file);
        for line in reader.lines() {
            let line = line.ok()?;
            if let Some(rest) = line.strip_prefix("Hugepagesize:") {
                let kb: usize = rest.split_whitespace().next()?.parse().ok()?;
                return Some(kb * 1024);
            }
        }
        None
    }
}

#[cfg(feature = "numa")]
pub use linux::LinuxHugePageSize;
