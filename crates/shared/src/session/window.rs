/// Sliding window with a pinned head: keeps the first item plus the most
/// recent `window - 1` items, in their original order.
pub fn trim_history<T>(mut items: Vec<T>, window: usize) -> Vec<T> {
    if window == 0 || items.len() <= window {
        return items;
    }

    let tail_start = items.len() - (window - 1);
    items.drain(1..tail_start);
    items
}
