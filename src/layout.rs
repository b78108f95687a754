use crate::config::LayoutOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportMode {
    Mobile,
    Desktop,
}

impl ViewportMode {
    pub fn classify(width_px: u32, breakpoint_px: u32) -> Self {
        if width_px < breakpoint_px {
            ViewportMode::Mobile
        } else {
            ViewportMode::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneTab {
    Editor,
    Preview,
}

/// Which single pane a mobile viewport shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileView {
    List,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisiblePanes {
    pub list: bool,
    pub editor: bool,
    pub preview: bool,
}

#[derive(Debug, Clone)]
pub struct LayoutState {
    mode: ViewportMode,
    evaluated: bool,
    tab: PaneTab,
    mobile_view: MobileView,
    options: LayoutOptions,
}

impl LayoutState {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            mode: ViewportMode::Desktop,
            evaluated: false,
            tab: PaneTab::Editor,
            mobile_view: MobileView::List,
            options,
        }
    }

    pub fn mode(&self) -> ViewportMode {
        self.mode
    }

    pub fn tab(&self) -> PaneTab {
        self.tab
    }

    pub fn mobile_view(&self) -> MobileView {
        self.mobile_view
    }

    pub fn width_px(&self, columns: u16) -> u32 {
        u32::from(columns) * self.options.cell_width_px
    }

    pub fn on_resize(&mut self, columns: u16, note_selected: bool) -> bool {
        self.on_resize_px(self.width_px(columns), note_selected)
    }

    /// Re-classifies the viewport. Returns true when the mode changed.
    pub fn on_resize_px(&mut self, width_px: u32, note_selected: bool) -> bool {
        let mode = ViewportMode::classify(width_px, self.options.mobile_breakpoint_px);
        let changed = !self.evaluated || mode != self.mode;
        self.evaluated = true;
        self.mode = mode;
        if changed && mode == ViewportMode::Mobile {
            if note_selected {
                self.mobile_view = MobileView::Note;
                self.tab = PaneTab::Editor;
            } else {
                self.mobile_view = MobileView::List;
            }
        }
        if changed {
            tracing::debug!(?mode, width_px, "viewport classified");
        }
        changed
    }

    pub fn on_note_opened(&mut self) {
        self.mobile_view = MobileView::Note;
    }

    pub fn on_note_closed(&mut self) {
        self.mobile_view = MobileView::List;
    }

    /// Mobile back action. Returns false when already on the list.
    pub fn back(&mut self) -> bool {
        if self.mode == ViewportMode::Mobile && self.mobile_view == MobileView::Note {
            self.mobile_view = MobileView::List;
            true
        } else {
            false
        }
    }

    pub fn set_tab(&mut self, tab: PaneTab) {
        self.tab = tab;
    }

    pub fn toggle_tab(&mut self) -> PaneTab {
        self.tab = match self.tab {
            PaneTab::Editor => PaneTab::Preview,
            PaneTab::Preview => PaneTab::Editor,
        };
        self.tab
    }

    pub fn visible(&self, note_selected: bool) -> VisiblePanes {
        let editor = self.tab == PaneTab::Editor;
        match self.mode {
            ViewportMode::Desktop => VisiblePanes {
                list: true,
                editor,
                preview: !editor,
            },
            ViewportMode::Mobile if note_selected && self.mobile_view == MobileView::Note => {
                VisiblePanes {
                    list: false,
                    editor,
                    preview: !editor,
                }
            }
            ViewportMode::Mobile => VisiblePanes {
                list: true,
                editor: false,
                preview: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> LayoutState {
        LayoutState::new(LayoutOptions::default())
    }

    #[test]
    fn classifies_around_breakpoint() {
        assert_eq!(ViewportMode::classify(767, 768), ViewportMode::Mobile);
        assert_eq!(ViewportMode::classify(768, 768), ViewportMode::Desktop);
        assert_eq!(ViewportMode::classify(0, 768), ViewportMode::Mobile);
    }

    #[test]
    fn columns_scale_by_cell_width() {
        let mut layout = layout();
        assert_eq!(layout.width_px(96), 768);
        layout.on_resize(95, false);
        assert_eq!(layout.mode(), ViewportMode::Mobile);
        layout.on_resize(96, false);
        assert_eq!(layout.mode(), ViewportMode::Desktop);
    }

    #[test]
    fn shrinking_with_selected_note_shows_editor_only() {
        let mut layout = layout();
        layout.on_resize_px(1024, true);
        layout.set_tab(PaneTab::Preview);
        assert!(layout.on_resize_px(500, true));
        assert_eq!(layout.mode(), ViewportMode::Mobile);
        assert_eq!(layout.tab(), PaneTab::Editor);
        assert_eq!(
            layout.visible(true),
            VisiblePanes {
                list: false,
                editor: true,
                preview: false
            }
        );
    }

    #[test]
    fn mobile_without_selection_shows_list() {
        let mut layout = layout();
        layout.on_resize_px(400, false);
        assert_eq!(
            layout.visible(false),
            VisiblePanes {
                list: true,
                editor: false,
                preview: false
            }
        );
    }

    #[test]
    fn opening_and_back_switch_mobile_pane() {
        let mut layout = layout();
        layout.on_resize_px(400, false);
        layout.on_note_opened();
        assert!(!layout.visible(true).list);
        assert!(layout.back());
        assert!(layout.visible(true).list);
        assert!(!layout.back());
    }

    #[test]
    fn desktop_keeps_sidebar_and_toggles_tab() {
        let mut layout = layout();
        layout.on_resize_px(1280, true);
        assert_eq!(layout.toggle_tab(), PaneTab::Preview);
        let panes = layout.visible(true);
        assert!(panes.list && panes.preview && !panes.editor);
        assert!(!layout.back());
    }

    #[test]
    fn resize_within_same_mode_keeps_mobile_view() {
        let mut layout = layout();
        layout.on_resize_px(400, true);
        layout.set_tab(PaneTab::Preview);
        assert!(!layout.on_resize_px(500, true));
        assert_eq!(layout.tab(), PaneTab::Preview);
    }
}
