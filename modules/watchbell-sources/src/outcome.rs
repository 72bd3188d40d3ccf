/// Discriminated result of an adapter fetch. Adapters never raise past
/// their boundary; "no data" and "try again later" are ordinary values
/// the engine can branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Ok(T),
    /// Upstream has no match for the title. Skipped silently.
    NotFound,
    /// Network/rate-limit/parse failure. Skipped this tick, retried
    /// naturally on the next one.
    Transient(String),
}
