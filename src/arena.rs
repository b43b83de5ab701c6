//! Fixed-width, index-addressed AST storage (spec §3, §4.1).
//!
//! Nodes are stored as packed 16-byte cells in an append-only vector. Cells
//! never hold a copy of source text — only `[start, end)` byte offsets into
//! the original buffer (the "index overlay" in the spec's terminology).
//! Parent nodes reach their children through a separate side table so the
//! cell itself stays fixed-width regardless of child count.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard cap on live cells in a single arena (spec §3, §4.1).
pub const MAX_CELLS: usize = 10_000_000;
/// Hard cap on source bytes a single arena may be built over (spec §3, §4.2).
pub const MAX_SOURCE_BYTES: usize = 10 * 1024 * 1024;

/// An opaque, 32-bit handle into a `NodeArena`. `NodeIndex::NONE` is the
/// sentinel distinguishing "no node" from a valid index; indices are never
/// reordered once allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for NodeIndex {
    fn default() -> Self {
        Self::NONE
    }
}

/// The tag on each cell. One canonical variant per AST concept — the
/// reference implementation this was distilled from carried two divergent
/// `CompilationUnitNode` definitions; this enum keeps exactly one shape per
/// concept instead (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NodeType {
    CompilationUnit,
    PackageDeclaration,
    ImportDeclaration,
    ClassDeclaration,
    InterfaceDeclaration,
    EnumDeclaration,
    RecordDeclaration,
    AnnotationDeclaration,
    FieldDeclaration,
    MethodDeclaration,
    ConstructorDeclaration,
    Modifier,
    Parameter,
    Block,
    Statement,
    ExpressionStatement,
    Identifier,
    Literal,
    TypeReference,
    Annotation,
    Unknown,
}

impl NodeType {
    /// Whether `data` on a cell of this type is a child-list index (as
    /// opposed to a token length or symbol-table index). Declarations,
    /// blocks and the compilation unit root all carry children; the rest
    /// are leaves.
    pub fn has_children(self) -> bool {
        !matches!(
            self,
            NodeType::Identifier
                | NodeType::Literal
                | NodeType::TypeReference
                | NodeType::Modifier
        )
    }
}

/// One packed 16-byte AST cell: `{ type_tag, start_offset, end_offset, data }`.
/// `data` is interpreted per `type_tag` — see `NodeType::has_children`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct NodeCell {
    type_tag: NodeType,
    start_offset: u32,
    end_offset: u32,
    data: u32,
}

/// A single leading/trailing comment attached to a declaration or statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
    Doc,
}

/// Parallel structure to the arena: comments never become AST cells of
/// their own, they attach to the node they precede or trail (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct Comment {
    pub kind: CommentKind,
    pub content_offset: u32,
    pub content_length: u32,
    pub attach_to: NodeIndex,
    pub leading: bool,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("cell count would exceed the {MAX_CELLS} cell cap")]
    CellCapExceeded,
    #[error("arena heap usage exceeded the configured soft limit of {0} bytes")]
    MemoryLimitExceeded(u64),
    #[error("start offset {start} is greater than end offset {end}")]
    InvalidRange { start: u32, end: u32 },
    #[error("offset {offset} is outside the {source_len}-byte source buffer")]
    OffsetOutOfBounds { offset: u32, source_len: u32 },
    #[error("node index {0:?} is not a live cell in this arena")]
    DanglingIndex(NodeIndex),
}

/// Append-only, bump-allocated store of AST cells plus the child-list and
/// comment side tables. Exclusively owns its cells: nothing outside may
/// retain a raw cell pointer, only `NodeIndex` values (spec §4.1).
pub struct NodeArena {
    cells: Vec<NodeCell>,
    child_lists: Vec<Vec<NodeIndex>>,
    comments: Vec<Comment>,
    source_len: u32,
    memory_soft_limit_bytes: u64,
    allocations_since_memory_check: u32,
}

impl NodeArena {
    /// `source_len` bounds every `start`/`end` offset passed to `allocate`.
    /// `memory_soft_limit_bytes` is sampled every 100 allocations, per the
    /// spec's correction of the original "every 100 allocations" heuristic
    /// (spec §9): it measures `memory_bytes()`, never host process heap.
    pub fn new(source_len: usize, memory_soft_limit_bytes: u64) -> Self {
        Self {
            cells: Vec::with_capacity(64),
            child_lists: Vec::new(),
            comments: Vec::new(),
            source_len: source_len as u32,
            memory_soft_limit_bytes,
            allocations_since_memory_check: 0,
        }
    }

    pub fn allocate(
        &mut self,
        type_tag: NodeType,
        start: u32,
        end: u32,
        data: u32,
    ) -> Result<NodeIndex, ArenaError> {
        if start > end {
            return Err(ArenaError::InvalidRange { start, end });
        }
        if end > self.source_len {
            return Err(ArenaError::OffsetOutOfBounds {
                offset: end,
                source_len: self.source_len,
            });
        }
        if self.cells.len() >= MAX_CELLS {
            return Err(ArenaError::CellCapExceeded);
        }

        self.allocations_since_memory_check += 1;
        if self.allocations_since_memory_check >= 100 {
            self.allocations_since_memory_check = 0;
            if self.memory_bytes() > self.memory_soft_limit_bytes {
                return Err(ArenaError::MemoryLimitExceeded(self.memory_soft_limit_bytes));
            }
        }

        let index = NodeIndex::new(self.cells.len() as u32);
        self.cells.push(NodeCell {
            type_tag,
            start_offset: start,
            end_offset: end,
            data,
        });
        Ok(index)
    }

    /// Allocates a fresh, empty child-list slot and returns its index into
    /// the side table, for use as a node's `data` field.
    pub fn new_child_list(&mut self) -> u32 {
        self.child_lists.push(Vec::new());
        (self.child_lists.len() - 1) as u32
    }

    pub fn push_child(&mut self, child_list_index: u32, child: NodeIndex) {
        self.child_lists[child_list_index as usize].push(child);
    }

    pub fn children(&self, child_list_index: u32) -> &[NodeIndex] {
        &self.child_lists[child_list_index as usize]
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    fn check_live(&self, i: NodeIndex) -> Result<usize, ArenaError> {
        let idx = i.as_usize();
        if i.is_none() || idx >= self.cells.len() {
            return Err(ArenaError::DanglingIndex(i));
        }
        Ok(idx)
    }

    pub fn get_type(&self, i: NodeIndex) -> Result<NodeType, ArenaError> {
        Ok(self.cells[self.check_live(i)?].type_tag)
    }

    pub fn get_start(&self, i: NodeIndex) -> Result<u32, ArenaError> {
        Ok(self.cells[self.check_live(i)?].start_offset)
    }

    pub fn get_end(&self, i: NodeIndex) -> Result<u32, ArenaError> {
        Ok(self.cells[self.check_live(i)?].end_offset)
    }

    pub fn get_data(&self, i: NodeIndex) -> Result<u32, ArenaError> {
        Ok(self.cells[self.check_live(i)?].data)
    }

    /// The only mutator after allocation; used exclusively by the parser
    /// for parent fix-up (wiring a declaration's `data` to its just-built
    /// child-list index, or patching a placeholder end offset).
    pub fn set_data(&mut self, i: NodeIndex, value: u32) -> Result<(), ArenaError> {
        let idx = self.check_live(i)?;
        self.cells[idx].data = value;
        Ok(())
    }

    pub fn set_end(&mut self, i: NodeIndex, end: u32) -> Result<(), ArenaError> {
        let idx = self.check_live(i)?;
        self.cells[idx].end_offset = end;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cells.capacity()
    }

    /// Rough estimate of cell + side-table heap usage, sampled every 100
    /// allocations by `allocate` (not on every call).
    pub fn memory_bytes(&self) -> u64 {
        let cells = self.cells.capacity() * std::mem::size_of::<NodeCell>();
        let child_lists = self.child_lists.capacity() * std::mem::size_of::<Vec<NodeIndex>>()
            + self
                .child_lists
                .iter()
                .map(|v| v.capacity() * std::mem::size_of::<NodeIndex>())
                .sum::<usize>();
        let comments = self.comments.capacity() * std::mem::size_of::<Comment>();
        (cells + child_lists + comments) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_read_back() {
        let mut arena = NodeArena::new(100, u64::MAX);
        let idx = arena
            .allocate(NodeType::Identifier, 0, 5, 5)
            .expect("allocation within bounds succeeds");
        assert_eq!(arena.get_type(idx).unwrap(), NodeType::Identifier);
        assert_eq!(arena.get_start(idx).unwrap(), 0);
        assert_eq!(arena.get_end(idx).unwrap(), 5);
        assert_eq!(arena.get_data(idx).unwrap(), 5);
    }

    #[test]
    fn rejects_inverted_range() {
        let mut arena = NodeArena::new(100, u64::MAX);
        assert_eq!(
            arena.allocate(NodeType::Identifier, 10, 5, 0),
            Err(ArenaError::InvalidRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn rejects_out_of_bounds_end() {
        let mut arena = NodeArena::new(10, u64::MAX);
        assert_eq!(
            arena.allocate(NodeType::Identifier, 0, 11, 0),
            Err(ArenaError::OffsetOutOfBounds {
                offset: 11,
                source_len: 10
            })
        );
    }

    #[test]
    fn dangling_index_is_rejected() {
        let arena = NodeArena::new(10, u64::MAX);
        assert_eq!(
            arena.get_type(NodeIndex::NONE),
            Err(ArenaError::DanglingIndex(NodeIndex::NONE))
        );
    }

    #[test]
    fn child_list_round_trips() {
        let mut arena = NodeArena::new(100, u64::MAX);
        let child = arena.allocate(NodeType::Identifier, 0, 1, 0).unwrap();
        let list = arena.new_child_list();
        arena.push_child(list, child);
        assert_eq!(arena.children(list), &[child]);
    }

    #[test]
    fn capacity_never_decreases() {
        let mut arena = NodeArena::new(1000, u64::MAX);
        let mut last_capacity = arena.capacity();
        for i in 0..500u32 {
            arena
                .allocate(NodeType::Identifier, i, i, 0)
                .unwrap();
            assert!(arena.capacity() >= last_capacity);
            last_capacity = arena.capacity();
        }
    }
}
