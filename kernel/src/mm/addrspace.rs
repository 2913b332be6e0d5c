/*!
 * Address Spaces
 *
 * An address space is a set of page-aligned regions (text, heap, stack)
 * backed by zero-filled 4 KiB pages that materialize on first write. Pages
 * are charged against a system-wide `PageBudget` when a region is defined or
 * copied, and returned when the address space is dropped.
 */

use crate::core::errors::Errno;
use crate::core::limits::{KERNEL_PTR, PAGE_SIZE, USERSTACK};
use crate::core::types::{SysResult, VAddr};
use ahash::AHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

static NEXT_AS_ID: AtomicU64 = AtomicU64::new(1);

/// System-wide pool of user pages
#[derive(Debug)]
pub struct PageBudget {
    total: usize,
    used: AtomicUsize,
}

impl PageBudget {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            total,
            used: AtomicUsize::new(0),
        })
    }

    /// Reserve `pages`, failing with ENOMEM if the pool cannot cover them
    pub fn charge(&self, pages: usize) -> SysResult<()> {
        let mut used = self.used.load(Ordering::Acquire);
        loop {
            let next = used.checked_add(pages).ok_or(Errno::NoMem)?;
            if next > self.total {
                warn!(requested = pages, used, total = self.total, "page budget exhausted");
                return Err(Errno::NoMem);
            }
            match self
                .used
                .compare_exchange_weak(used, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(actual) => used = actual,
            }
        }
    }

    pub fn release(&self, pages: usize) {
        let prev = self.used.fetch_sub(pages, Ordering::AcqRel);
        crate::kassert!(prev >= pages, "page budget underflow: {} < {}", prev, pages);
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.total.saturating_sub(self.used())
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Kind of a mapped region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Text,
    Heap,
    Stack,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    kind: RegionKind,
    base: VAddr,
    pages: usize,
}

impl Region {
    fn end(&self) -> u64 {
        self.base as u64 + (self.pages * PAGE_SIZE) as u64
    }

    fn contains(&self, addr: VAddr) -> bool {
        (addr as u64) >= self.base as u64 && (addr as u64) < self.end()
    }
}

/// A simulated user address space
pub struct AddrSpace {
    id: u64,
    budget: Arc<PageBudget>,
    regions: Vec<Region>,
    pages: AHashMap<u32, Box<[u8]>>,
    charged: usize,
    generation: u64,
    brk: VAddr,
}

impl AddrSpace {
    /// Empty address space drawing pages from `budget`
    pub fn create(budget: Arc<PageBudget>) -> Self {
        let id = NEXT_AS_ID.fetch_add(1, Ordering::Relaxed);
        trace!(asid = id, "address space created");
        Self {
            id,
            budget,
            regions: Vec::new(),
            pages: AHashMap::new(),
            charged: 0,
            generation: 0,
            brk: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Map `pages` zero-filled pages at `base`
    pub fn define_region(&mut self, kind: RegionKind, base: VAddr, pages: usize) -> SysResult<()> {
        if base as usize % PAGE_SIZE != 0 || pages == 0 {
            return Err(Errno::Inval);
        }
        let candidate = Region { kind, base, pages };
        if candidate.end() > KERNEL_PTR as u64 {
            return Err(Errno::Fault);
        }
        let overlaps = self
            .regions
            .iter()
            .any(|r| (candidate.base as u64) < r.end() && (r.base as u64) < candidate.end());
        if overlaps {
            return Err(Errno::Inval);
        }

        self.budget.charge(pages)?;
        self.charged += pages;
        self.regions.push(candidate);
        if kind == RegionKind::Heap {
            self.brk = base;
        }
        debug!(asid = self.id, ?kind, base = format_args!("{:#x}", base), pages, "region defined");
        Ok(())
    }

    /// Map the user stack below `USERSTACK`; returns the initial stack pointer
    pub fn define_stack(&mut self, pages: usize) -> SysResult<VAddr> {
        let size = pages.checked_mul(PAGE_SIZE).ok_or(Errno::NoMem)?;
        let base = (USERSTACK as usize).checked_sub(size).ok_or(Errno::NoMem)? as VAddr;
        self.define_region(RegionKind::Stack, base, pages)?;
        Ok(USERSTACK)
    }

    /// Base and size in pages of the first region of `kind`
    pub fn region(&self, kind: RegionKind) -> Option<(VAddr, usize)> {
        self.regions
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| (r.base, r.pages))
    }

    /// Deep copy, charging the new pages to the same budget
    pub fn copy(&self) -> SysResult<AddrSpace> {
        self.budget.charge(self.charged)?;
        let mut new = AddrSpace::create(Arc::clone(&self.budget));
        new.charged = self.charged;
        new.regions = self.regions.clone();
        new.pages = self.pages.clone();
        new.brk = self.brk;
        debug!(from = self.id, to = new.id, pages = self.charged, "address space copied");
        Ok(new)
    }

    /// Make this the translation context of the running thread
    pub fn activate(&mut self) {
        self.generation += 1;
        trace!(asid = self.id, generation = self.generation, "address space activated");
    }

    /// Current end of the used part of the heap
    pub fn brk(&self) -> VAddr {
        self.brk
    }

    /// Move the heap break; it must stay inside the heap region
    pub fn set_brk(&mut self, brk: VAddr) -> SysResult<()> {
        let (base, pages) = self.region(RegionKind::Heap).ok_or(Errno::NoMem)?;
        let end = base as u64 + (pages * PAGE_SIZE) as u64;
        if (brk as u64) < base as u64 || brk as u64 > end {
            return Err(Errno::NoMem);
        }
        self.brk = brk;
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pages_charged(&self) -> usize {
        self.charged
    }

    /// Whether every byte of `[addr, addr + len)` is mapped
    pub fn is_mapped(&self, addr: VAddr, len: usize) -> bool {
        self.check_range(addr, len).is_ok()
    }

    fn check_range(&self, addr: VAddr, len: usize) -> SysResult<()> {
        let end = addr as u64 + len as u64;
        if end > KERNEL_PTR as u64 {
            return Err(Errno::Fault);
        }
        let mut cursor = addr as u64;
        while cursor < end {
            let region = self
                .regions
                .iter()
                .find(|r| r.contains(cursor as VAddr))
                .ok_or(Errno::Fault)?;
            cursor = region.end();
        }
        Ok(())
    }

    /// Copy `buf.len()` bytes starting at `addr` out of user memory
    pub fn read(&self, addr: VAddr, buf: &mut [u8]) -> SysResult<()> {
        self.check_range(addr, buf.len())?;
        let mut done = 0;
        while done < buf.len() {
            let va = addr as usize + done;
            let page = (va / PAGE_SIZE) as u32;
            let off = va % PAGE_SIZE;
            let n = (PAGE_SIZE - off).min(buf.len() - done);
            match self.pages.get(&page) {
                Some(frame) => buf[done..done + n].copy_from_slice(&frame[off..off + n]),
                None => buf[done..done + n].fill(0),
            }
            done += n;
        }
        Ok(())
    }

    /// Copy `data` into user memory at `addr`
    pub fn write(&mut self, addr: VAddr, data: &[u8]) -> SysResult<()> {
        self.check_range(addr, data.len())?;
        let mut done = 0;
        while done < data.len() {
            let va = addr as usize + done;
            let page = (va / PAGE_SIZE) as u32;
            let off = va % PAGE_SIZE;
            let n = (PAGE_SIZE - off).min(data.len() - done);
            let frame = self
                .pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE].into_boxed_slice());
            frame[off..off + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
        Ok(())
    }
}

impl Drop for AddrSpace {
    fn drop(&mut self) {
        if self.charged > 0 {
            self.budget.release(self.charged);
        }
        trace!(asid = self.id, pages = self.charged, "address space destroyed");
    }
}

impl fmt::Debug for AddrSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddrSpace")
            .field("id", &self.id)
            .field("regions", &self.regions)
            .field("resident", &self.pages.len())
            .field("charged", &self.charged)
            .finish()
    }
}
