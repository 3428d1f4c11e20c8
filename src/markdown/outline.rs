//! Heading outline extraction.
//!
//! While a page renders, every heading of level 2 or deeper is recorded as a
//! [`HeadingNode`]; children are the headings one level deeper that appear
//! before the next heading of equal or shallower level. Level 1 is reserved
//! for the page title and never appears in the outline.

/// One heading in a page's outline tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingNode {
    pub title: String,
    /// Slug of the title, doubling as the rendered `id` attribute.
    pub id: String,
    pub children: Vec<HeadingNode>,
}

/// Accumulates headings in document order and assembles the tree.
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    roots: Vec<HeadingNode>,
    /// Chain of currently open headings, shallowest first.
    stack: Vec<(u32, HeadingNode)>,
}

impl OutlineBuilder {
    pub fn new() -> Self {
        OutlineBuilder::default()
    }

    /// Record a heading. Level 1 headings are ignored.
    pub fn push(&mut self, level: u32, title: String, id: String) {
        if level < 2 {
            return;
        }
        while matches!(self.stack.last(), Some((open, _)) if *open >= level) {
            self.close_top();
        }
        self.stack.push((
            level,
            HeadingNode {
                title,
                id,
                children: Vec::new(),
            },
        ));
    }

    pub fn finish(mut self) -> Vec<HeadingNode> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.roots
    }

    fn close_top(&mut self) {
        if let Some((_, node)) = self.stack.pop() {
            match self.stack.last_mut() {
                Some((_, parent)) => parent.children.push(node),
                None => self.roots.push(node),
            }
        }
    }
}
