use log::{debug, error, info};
use parking_lot::RwLock;
use std::time::SystemTime;

use heappage::api::error::Error;
use heappage::api::page::{Page, RecordId, INVALID_PAGE};
use heappage::api::HeapPage;
use heappage::util::{self, hex::prefix};

/// Pages chained the way a heap file links them, each behind its own latch.
struct Chain {
    pages: Vec<RwLock<HeapPage>>,
}

impl Chain {
    fn new() -> Self {
        Self {
            pages: vec![RwLock::new(HeapPage::create(1))],
        }
    }

    fn page(&self, id: u32) -> &RwLock<HeapPage> {
        &self.pages[id as usize - 1]
    }

    /// Insert into the tail page, linking a fresh page once the tail is full.
    fn insert(&mut self, rec: &[u8]) -> Result<RecordId, Error> {
        let tail = self.pages.len() as u32;
        match self.page(tail).write().insert(rec) {
            Err(Error::NotEnoughSpace(_, _)) => {}
            result => return result,
        }

        let new = tail + 1;
        let mut page = HeapPage::create(new);
        page.set_prev(tail);
        self.page(tail).write().set_next(new);
        debug!("chain: page={} linked after page={}", new, tail);
        let rid = page.insert(rec)?;
        self.pages.push(RwLock::new(page));
        Ok(rid)
    }

    /// Number of pages reachable by following next links from the head.
    fn walk(&self) -> usize {
        let mut n = 0;
        let mut prev = INVALID_PAGE;
        let mut id = 1;
        while id != INVALID_PAGE {
            let page = self.page(id).read();
            if page.prev() != prev {
                error!("page={} prev={} expected={}", id, page.prev(), prev);
            }
            n += 1;
            prev = id;
            id = page.next();
        }
        n
    }

    fn lookup(&self, rid: RecordId) -> Result<Vec<u8>, Error> {
        let page = self.page(rid.page).read();
        let mut buf = vec![0u8; page.view(rid)?.len()];
        let len = page.get(rid, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    fn remove(&self, rid: RecordId) -> Result<(), Error> {
        self.page(rid.page).write().delete(rid)
    }
}

fn rate(count: usize, millis: u128) -> u128 {
    count as u128 * 1000 / millis.max(1)
}

fn benchmark(count: usize, seed: u64, threads: usize) {
    let data = util::data(count, 256, seed);
    let mut chain = Chain::new();

    let mut now = SystemTime::now();
    let mut rids = Vec::with_capacity(data.len());
    for rec in data.iter() {
        match chain.insert(rec) {
            Ok(rid) => rids.push(rid),
            Err(e) => {
                error!("insert: rec='{}' failed: {}", prefix(rec, 8), e);
                return;
            }
        }
    }
    let mut millis = now.elapsed().unwrap_or_default().as_millis();
    info!(
        "insert: {} ms (rate={} op/s) pages={}",
        millis,
        rate(count, millis),
        chain.pages.len()
    );

    now = SystemTime::now();
    let chunk = (rids.len() / threads.max(1)).max(1);
    let errors: usize = std::thread::scope(|s| {
        let handles = rids
            .chunks(chunk)
            .zip(data.chunks(chunk))
            .map(|(rids, data)| {
                let chain = &chain;
                s.spawn(move || {
                    rids.iter()
                        .zip(data.iter())
                        .filter(|(rid, rec)| match chain.lookup(**rid) {
                            Ok(found) => found != **rec,
                            Err(e) => {
                                error!("lookup: {:?} failed: {}", rid, e);
                                true
                            }
                        })
                        .count()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(chunk))
            .sum()
    });
    millis = now.elapsed().unwrap_or_default().as_millis();
    info!(
        "lookup: {} ms (rate={} op/s) threads={}",
        millis,
        rate(count, millis),
        threads
    );
    if errors > 0 {
        error!("lookup errors: {}", errors);
    }

    now = SystemTime::now();
    for rid in util::shuffle(rids, seed).into_iter() {
        if let Err(e) = chain.remove(rid) {
            error!("remove: {:?} failed: {}", rid, e);
        }
    }
    millis = now.elapsed().unwrap_or_default().as_millis();
    info!("remove: {} ms (rate={} op/s)", millis, rate(count, millis));

    let linked = chain.walk();
    if linked != chain.pages.len() {
        error!("chain: {} pages linked, {} allocated", linked, chain.pages.len());
    }
    for lock in chain.pages.iter() {
        let page = lock.read();
        if !page.is_empty() {
            error!("page={} not empty: {} records left", page.id(), page.count());
        }
        if let Err(e) = page.check() {
            error!("page={} check failed: {}", page.id(), e);
        }
    }
}

// RUST_LOG=info cargo run --release -- 100000 42
fn main() {
    env_logger::init();
    let mut it = std::env::args().skip(1);
    let count = it
        .next()
        .and_then(|x| x.parse::<usize>().ok())
        .unwrap_or(1000);
    let seed = it
        .next()
        .and_then(|x| x.parse::<u64>().ok())
        .unwrap_or(42);
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    info!("count={} seed={} threads={}", count, seed, threads);
    benchmark(count, seed, threads);
}
