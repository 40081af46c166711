/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Navigation
    GoBack,
    Quit,

    // Target selection
    ListUp,
    ListDown,
    ListSelect,
    SelectSource(usize),
    OpenTargetPicker,

    // Tail session
    StartTail,
    ToggleTail,
    ClearLogs,
    ExportLogs,

    // Filter in log viewer
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    ApplyFilter,
    ClearFilter,

    // Log viewer scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,
    ToggleSourceNames,

    // Overlays and messages
    ToggleHelp,
    DismissNotice,
}
