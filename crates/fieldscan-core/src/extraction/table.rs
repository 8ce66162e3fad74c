use crate::config::RowBand;
use crate::model::Token;

/// Reconstruct a table region's grid from recognizer tokens.
///
/// Tokens with blank text are dropped. The rest are sorted top-to-bottom and
/// clustered into rows by `band`; each row is ordered left-to-right. Rows may
/// have different lengths. The result does not depend on input token order.
pub fn reconstruct(tokens: &[Token], band: RowBand) -> Vec<Vec<String>> {
    let mut kept: Vec<&Token> = tokens.iter().filter(|t| !t.text.trim().is_empty()).collect();
    if kept.is_empty() {
        return Vec::new();
    }

    kept.sort_by(|a, b| {
        a.top
            .cmp(&b.top)
            .then(a.left.cmp(&b.left))
            .then_with(|| a.text.cmp(&b.text))
    });

    let median_height = median_height(&kept);

    let mut rows: Vec<Vec<&Token>> = Vec::new();
    let mut anchor_top = i64::MIN;
    for token in kept {
        let joins_current = !rows.is_empty() && same_row(band, anchor_top, token.top, median_height);
        if joins_current {
            if let Some(row) = rows.last_mut() {
                row.push(token);
            }
        } else {
            anchor_top = token.top;
            rows.push(vec![token]);
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.left.cmp(&b.left).then_with(|| a.text.cmp(&b.text)));
            row.into_iter().map(|t| t.text.trim().to_string()).collect()
        })
        .collect()
}

/// `top` is never above `anchor` because tokens arrive sorted.
fn same_row(band: RowBand, anchor: i64, top: i64, median_height: Option<u32>) -> bool {
    let diff = top - anchor;
    match band {
        RowBand::Exact => diff == 0,
        RowBand::Fixed { pixels } => diff <= i64::from(pixels),
        RowBand::HalfMedianHeight => match median_height {
            Some(h) => diff * 2 < i64::from(h),
            None => diff == 0,
        },
    }
}

fn median_height(tokens: &[&Token]) -> Option<u32> {
    let mut heights: Vec<u32> = tokens.iter().filter_map(|t| t.height).filter(|h| *h > 0).collect();
    if heights.is_empty() {
        return None;
    }
    heights.sort_unstable();
    Some(heights[heights.len() / 2])
}
