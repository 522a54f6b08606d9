// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::ops::Range;

use crate::{ApiProfile, ApiToken, SelectionQuery, SelectionReconciler};

pub const CHECKBOX_KEY: &str = "__selected";
pub const MIN_VISIBLE_ROWS: usize = 1;
pub const MAX_VISIBLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub width: u16,
}

const fn column(key: &'static str, label: &'static str, width: u16) -> Column {
    Column { key, label, width }
}

pub const CHECKBOX_COLUMN: Column = column(CHECKBOX_KEY, "", 3);

pub const PROFILE_COLUMNS: [Column; 8] = [
    CHECKBOX_COLUMN,
    column("id", "ID", 4),
    column("apiUrl", "URL", 32),
    column("apiKeyMasked", "API_KEY", 10),
    column("model", "MODEL", 18),
    column("maxTokens", "MAX_TOKENS", 11),
    column("temperature", "TEMPERATURE", 12),
    column("relatedNumber", "RELATED", 8),
];

pub const TOKEN_COLUMNS: [Column; 3] = [
    CHECKBOX_COLUMN,
    column("index", "Index", 6),
    column("token", "Token", 44),
];

/// Display-ready values for one row, keyed by column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowProjection {
    pub cells: Vec<(&'static str, String)>,
}

impl RowProjection {
    pub fn blank(columns: &[Column]) -> Self {
        Self {
            cells: columns
                .iter()
                .map(|column| (column.key, String::new()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> &str {
        self.cells
            .iter()
            .find(|(cell_key, _)| *cell_key == key)
            .map_or("", |(_, value)| value.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_empty())
    }
}

pub trait RowProjector {
    fn columns(&self) -> &'static [Column];
    fn row_count(&self) -> usize;
    fn row_data(&self, index: usize) -> RowProjection;
    fn row_search_string(&self, index: usize) -> String;
}

pub fn mask_api_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 4 {
        return "****".to_owned();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileTable<'a> {
    profiles: &'a [ApiProfile],
}

impl<'a> ProfileTable<'a> {
    pub fn new(profiles: &'a [ApiProfile]) -> Self {
        Self { profiles }
    }
}

impl RowProjector for ProfileTable<'_> {
    fn columns(&self) -> &'static [Column] {
        &PROFILE_COLUMNS
    }

    fn row_count(&self) -> usize {
        self.profiles.len()
    }

    fn row_data(&self, index: usize) -> RowProjection {
        let Some(profile) = self.profiles.get(index) else {
            return RowProjection::blank(self.columns());
        };
        RowProjection {
            cells: vec![
                (CHECKBOX_KEY, String::new()),
                ("id", (index + 1).to_string()),
                ("apiUrl", profile.api_url.clone()),
                ("apiKeyMasked", mask_api_key(&profile.api_key)),
                ("model", profile.model.clone()),
                ("maxTokens", profile.max_tokens.to_string()),
                ("temperature", profile.temperature.to_string()),
                ("relatedNumber", profile.related_number.to_string()),
            ],
        }
    }

    fn row_search_string(&self, index: usize) -> String {
        let Some(profile) = self.profiles.get(index) else {
            return String::new();
        };
        [profile.api_url.as_str(), profile.model.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenTable<'a> {
    tokens: &'a [ApiToken],
}

impl<'a> TokenTable<'a> {
    pub fn new(tokens: &'a [ApiToken]) -> Self {
        Self { tokens }
    }
}

impl RowProjector for TokenTable<'_> {
    fn columns(&self) -> &'static [Column] {
        &TOKEN_COLUMNS
    }

    fn row_count(&self) -> usize {
        self.tokens.len()
    }

    fn row_data(&self, index: usize) -> RowProjection {
        let Some(token) = self.tokens.get(index) else {
            return RowProjection::blank(self.columns());
        };
        RowProjection {
            cells: vec![
                (CHECKBOX_KEY, String::new()),
                ("index", (index + 1).to_string()),
                ("token", token.as_str().to_owned()),
            ],
        }
    }

    fn row_search_string(&self, index: usize) -> String {
        self.tokens
            .get(index)
            .map(|token| token.as_str().to_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCell {
    pub key: &'static str,
    pub text: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayer {
    SelectionBackdrop,
    StickyCheckbox { checked: bool, highlighted: bool },
}

/// A rendered row before it reaches the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowNode {
    pub index: usize,
    pub cells: Vec<RowCell>,
    pub layers: Vec<RowLayer>,
}

impl RowNode {
    pub fn from_projection(index: usize, projection: RowProjection) -> Self {
        Self {
            index,
            cells: projection
                .cells
                .into_iter()
                .map(|(key, text)| RowCell {
                    key,
                    text,
                    hidden: false,
                })
                .collect(),
            layers: Vec::new(),
        }
    }

    pub fn has_backdrop(&self) -> bool {
        self.layers.contains(&RowLayer::SelectionBackdrop)
    }

    pub fn checkbox(&self) -> Option<(bool, bool)> {
        self.layers.iter().find_map(|layer| match layer {
            RowLayer::StickyCheckbox {
                checked,
                highlighted,
            } => Some((*checked, *highlighted)),
            RowLayer::SelectionBackdrop => None,
        })
    }

    pub fn visible_cells(&self) -> impl Iterator<Item = &RowCell> {
        self.cells.iter().filter(|cell| !cell.hidden)
    }
}

pub trait RowDecorator {
    fn decorate_row(
        &self,
        node: &mut RowNode,
        native: &dyn SelectionQuery,
        checks: &SelectionReconciler,
    );
}

/// Overlays the sticky checkbox and, for tables that want it, a full-width
/// backdrop on natively selected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckboxDecorator {
    pub selection_backdrop: bool,
}

impl CheckboxDecorator {
    pub const PROFILES: Self = Self {
        selection_backdrop: true,
    };
    pub const TOKENS: Self = Self {
        selection_backdrop: false,
    };
}

impl RowDecorator for CheckboxDecorator {
    fn decorate_row(
        &self,
        node: &mut RowNode,
        native: &dyn SelectionQuery,
        checks: &SelectionReconciler,
    ) {
        node.layers.clear();
        let selected = native.is_selected(node.index);
        if self.selection_backdrop && selected {
            node.layers.push(RowLayer::SelectionBackdrop);
        }
        if let Some(placeholder) = node.cells.first_mut() {
            placeholder.hidden = true;
        }
        node.layers.push(RowLayer::StickyCheckbox {
            checked: checks.is_checked(node.index),
            highlighted: selected,
        });
    }
}

/// Where a click on a row landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClick {
    ToggleChecked(usize),
    SelectRow(usize),
}

/// Clicks inside the frozen checkbox column only toggle the checkbox and
/// never reach native selection.
pub fn route_click(index: usize, x_offset: u16) -> RowClick {
    if x_offset < CHECKBOX_COLUMN.width {
        RowClick::ToggleChecked(index)
    } else {
        RowClick::SelectRow(index)
    }
}

pub fn visible_data_rows(row_count: usize) -> usize {
    row_count.clamp(MIN_VISIBLE_ROWS, MAX_VISIBLE_ROWS)
}

/// Saturates at `u16::MAX` instead of overflowing on oversized rows.
pub fn viewport_height(row_count: usize, header_height: u16, row_height: u16) -> u16 {
    let rows = u16::try_from(visible_data_rows(row_count)).unwrap_or(u16::MAX);
    header_height.saturating_add(rows.saturating_mul(row_height))
}

/// Binds a projector and a decorator into something a host can draw.
#[derive(Debug, Clone, Copy)]
pub struct TableController<P, D> {
    projector: P,
    decorator: D,
}

impl<P: RowProjector, D: RowDecorator> TableController<P, D> {
    pub fn new(projector: P, decorator: D) -> Self {
        Self {
            projector,
            decorator,
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        self.projector.columns()
    }

    pub fn row_count(&self) -> usize {
        self.projector.row_count()
    }

    pub fn row_data(&self, index: usize) -> RowProjection {
        self.projector.row_data(index)
    }

    pub fn row_search_string(&self, index: usize) -> String {
        self.projector.row_search_string(index)
    }

    pub fn render_row(
        &self,
        index: usize,
        native: &dyn SelectionQuery,
        checks: &SelectionReconciler,
    ) -> RowNode {
        let mut node = RowNode::from_projection(index, self.projector.row_data(index));
        self.decorator.decorate_row(&mut node, native, checks);
        node
    }

    pub fn render_rows(
        &self,
        rows: Range<usize>,
        native: &dyn SelectionQuery,
        checks: &SelectionReconciler,
    ) -> Vec<RowNode> {
        let end = rows.end.min(self.row_count());
        (rows.start.min(end)..end)
            .map(|index| self.render_row(index, native, checks))
            .collect()
    }

    pub fn viewport_height(&self, header_height: u16, row_height: u16) -> u16 {
        viewport_height(self.row_count(), header_height, row_height)
    }

    /// Type-ahead find: the first row at or after `start`, wrapping, whose
    /// search string contains `query` case-insensitively.
    pub fn find(&self, query: &str, start: usize) -> Option<usize> {
        let needle = query.trim().to_lowercase();
        let count = self.row_count();
        if needle.is_empty() || count == 0 {
            return None;
        }
        (0..count)
            .map(|offset| (start + offset) % count)
            .find(|index| {
                self.projector
                    .row_search_string(*index)
                    .to_lowercase()
                    .contains(&needle)
            })
    }
}
