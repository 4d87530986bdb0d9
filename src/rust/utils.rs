use ndarray::ArrayView2;
use std::time::Duration;

/// Index of the highest score in every row; the first maximum wins on ties.
pub(crate) fn argmax_rows(scores: ArrayView2<'_, f32>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (idx, &value) in row.iter().enumerate().skip(1) {
                if value > row[best] {
                    best = idx;
                }
            }
            best
        })
        .collect()
}

/// Formats a duration as `h:mm:ss`, rounded to the nearest second.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().round() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
