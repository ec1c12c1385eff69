/// Propagation state of a tuple.
///
/// ```text
/// insert:  Creating --flush--> Ok
/// update:  Ok -> Updating --flush--> Ok
/// retract: Ok | Updating -> Dying --flush--> Dead
///          Creating -> Aborting --flush--> Dead (never seen downstream)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleState {
    Creating,
    Ok,
    Updating,
    Dying,
    Dead,
    Aborting,
}

impl TupleState {
    /// True while downstream nodes know about the tuple.
    pub fn is_active(self) -> bool {
        matches!(self, TupleState::Ok | TupleState::Updating)
    }

    /// True once the tuple is on its way out.
    pub fn is_dirty_removal(self) -> bool {
        matches!(self, TupleState::Dying | TupleState::Aborting)
    }
}
