use crate::platform::ComponentSpec;

/// Discord allows at most this many action rows on a message.
pub const MAX_ROWS: usize = 5;
pub const BUTTONS_PER_ROW: usize = 5;

/// Lays components out into action rows.
///
/// Every select menu takes a row of its own, buttons fill the remaining rows
/// five at a time. Whatever doesn't fit is dropped.
pub fn pack_rows(components: Vec<ComponentSpec>) -> Vec<Vec<ComponentSpec>> {
    let (menus, buttons): (Vec<_>, Vec<_>) = components
        .into_iter()
        .partition(|component| matches!(component, ComponentSpec::Select(_)));

    let mut rows: Vec<Vec<ComponentSpec>> = menus
        .into_iter()
        .take(MAX_ROWS)
        .map(|menu| vec![menu])
        .collect();

    let mut buttons = buttons.into_iter();
    while rows.len() < MAX_ROWS {
        let row: Vec<_> = buttons.by_ref().take(BUTTONS_PER_ROW).collect();
        if row.is_empty() {
            break;
        }
        rows.push(row);
    }

    rows
}
