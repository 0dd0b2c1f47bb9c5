//! Parallel decoding of many backups on the rayon pool.

use std::io::{Read, Write};

use rayon::prelude::*;

use crate::error::Result;
use crate::session::DecodeSession;

/// Drive every `(session, writer)` pair to completion in parallel.
///
/// Sessions share nothing, so one failure does not affect the others; the
/// result for each pair is returned in input order.
pub fn decrypt_batch<R, W>(batch: &mut [(DecodeSession<R>, W)]) -> Vec<Result<u64>>
where
    R: Read + Send,
    W: Write + Send,
{
    batch
        .par_iter_mut()
        .map(|(session, writer)| session.decode_to(writer))
        .collect()
}
