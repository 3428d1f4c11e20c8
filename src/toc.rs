//! Site-wide table of contents.
//!
//! Every titled page across all collections is inserted into a trie keyed by
//! case-insensitive URL segment; entries are then built bottom-up. A folder
//! whose direct child is an index page adopts that page's name, href, and
//! ordering, so a directory with an `index.md` behaves like a page. Plain
//! folders get an APA title-cased label and the minimum child order.
//!
//! Siblings sort ascending by order with `i32::MAX` as "unordered, sort
//! last"; tie order is not observably stable and nothing should rely on it.

use crate::{
    content::PageSnapshot,
    paths::{folder_label, join_url, normalize_route, trim_slashes},
};

/// One node of the rendered TOC tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub href: Option<String>,
    pub items: Vec<TocEntry>,
    pub order: i32,
    pub is_selected: bool,
}

#[derive(Debug, Default)]
struct TrieNode {
    segment: String,
    children: Vec<TrieNode>,
    leaf: Option<Leaf>,
}

#[derive(Debug)]
struct Leaf {
    title: String,
    order: i32,
    href: String,
    is_index: bool,
}

/// Build the TOC from all pages, the site base URL, and the URL of the page
/// currently being rendered (drives `is_selected`).
pub fn build_toc(pages: &[PageSnapshot], base_url: &str, current_url: &str) -> Vec<TocEntry> {
    let mut root = TrieNode::default();

    for page in pages {
        let Some(title) = page.metadata.title.clone() else {
            continue;
        };
        let relative = trim_slashes(&page.navigate_url);
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        let href = join_url(base_url, relative);
        let is_index = segments
            .last()
            .map(|s| s.eq_ignore_ascii_case("index"))
            .unwrap_or(false);
        insert(
            &mut root,
            &segments,
            Leaf {
                title,
                order: page.metadata.order,
                href,
                is_index,
            },
        );
    }

    let current = normalize_route(current_url);
    let mut entries: Vec<TocEntry> = root
        .children
        .iter()
        .map(|child| entry_for(child, &current))
        .collect();
    sort_siblings(&mut entries);
    entries
}

fn insert(node: &mut TrieNode, segments: &[&str], leaf: Leaf) {
    let Some((head, rest)) = segments.split_first() else {
        node.leaf = Some(leaf);
        return;
    };
    let position = node
        .children
        .iter()
        .position(|c| c.segment.eq_ignore_ascii_case(head));
    let child = match position {
        Some(i) => &mut node.children[i],
        None => {
            node.children.push(TrieNode {
                segment: head.to_string(),
                ..Default::default()
            });
            node.children.last_mut().expect("just pushed")
        }
    };
    insert(child, rest, leaf);
}

fn entry_for(node: &TrieNode, current: &str) -> TocEntry {
    let mut child_entries: Vec<TocEntry> =
        node.children.iter().map(|c| entry_for(c, current)).collect();

    if let Some(leaf) = &node.leaf {
        let selected = normalize_route(&leaf.href) == current
            || child_entries.iter().any(|e| e.is_selected);
        sort_siblings(&mut child_entries);
        return TocEntry {
            name: leaf.title.clone(),
            href: Some(leaf.href.clone()),
            items: child_entries,
            order: leaf.order,
            is_selected: selected,
        };
    }

    // A folder with a direct index child adopts it.
    let index_position = node
        .children
        .iter()
        .position(|c| c.leaf.as_ref().map(|l| l.is_index).unwrap_or(false));
    if let Some(position) = index_position {
        let leaf = node.children[position]
            .leaf
            .as_ref()
            .expect("position found by leaf presence");
        let mut items = Vec::with_capacity(child_entries.len());
        let mut selected = false;
        for (i, entry) in child_entries.into_iter().enumerate() {
            if i == position {
                selected |= entry.is_selected;
                // The index node dissolves; its own children join the folder.
                items.extend(entry.items);
            } else {
                items.push(entry);
            }
        }
        selected |= items.iter().any(|e| e.is_selected);
        sort_siblings(&mut items);
        return TocEntry {
            name: leaf.title.clone(),
            href: Some(leaf.href.clone()),
            items,
            order: leaf.order,
            is_selected: selected,
        };
    }

    let order = child_entries.iter().map(|e| e.order).min().unwrap_or(i32::MAX);
    let selected = child_entries.iter().any(|e| e.is_selected);
    sort_siblings(&mut child_entries);
    TocEntry {
        name: folder_label(&node.segment),
        href: None,
        items: child_entries,
        order,
        is_selected: selected,
    }
}

fn sort_siblings(entries: &mut [TocEntry]) {
    entries.sort_by_key(|e| e.order);
}
