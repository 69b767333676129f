use std::collections::HashMap;

use crate::scene::Scene;
use crate::selection::SelectionResult;
use crate::view::ScaleRuler;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
    /// 命令改变了选中状态时附带新的选中结果。
    pub selection: Option<SelectionResult>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            selection: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: SelectionResult) -> Self {
        self.selection = Some(selection);
        self
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ClearSelectionCommand);
        bus.register(ResetViewCommand);
        bus.register(ToggleOrientationCommand);
        bus.register(HideRulerCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.scene.clear_selection() {
            Ok(Some(result)) => CommandResponse::ok("选中已清空").with_selection(result),
            Ok(None) => CommandResponse::ok("当前没有选中的元素"),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct ResetViewCommand;

impl CommandHandler for ResetViewCommand {
    fn name(&self) -> &'static str {
        "reset_view"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.scene.reset_view() {
            CommandResponse::ok("视图已复位")
        } else {
            CommandResponse::ok("视图已是初始状态")
        }
    }
}

struct ToggleOrientationCommand;

impl CommandHandler for ToggleOrientationCommand {
    fn name(&self) -> &'static str {
        "toggle_orientation"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.toggle_orientation();
        let page = context.scene.page();
        CommandResponse::ok(format!("页面尺寸 {}x{}", page.width, page.height()))
    }
}

struct HideRulerCommand;

impl CommandHandler for HideRulerCommand {
    fn name(&self) -> &'static str {
        "hide_ruler"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.scene.set_ruler(ScaleRuler::hidden()) {
            Ok(_) => CommandResponse::ok("比例尺已隐藏"),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}
