use std::collections::HashMap;

use geostake_core::geometry::Point2;

use crate::session::MeasurementSession;

#[derive(Debug, Clone)]
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

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
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
    pub session: &'a mut MeasurementSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddPickCommand);
        bus.register(RemovePickCommand);
        bus.register(UndoPickCommand);
        bus.register(RedoPickCommand);
        bus.register(ClearPicksCommand);
        bus.register(ToggleMeasureModeCommand);
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

fn summary(session: &MeasurementSession) -> String {
    format!(
        "{} 点，{}: {:.3}",
        session.len(),
        session.mode().describe(),
        session.measured_value()
    )
}

struct AddPickCommand;

impl CommandHandler for AddPickCommand {
    fn name(&self) -> &'static str {
        "add_pick"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Ok(coords) = request
            .args
            .iter()
            .map(|arg| arg.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
        else {
            return CommandResponse::err("用法: add_pick <东> <北>");
        };
        match coords.as_slice() {
            [x, y] if x.is_finite() && y.is_finite() => {
                context.session.add(Point2::new(*x, *y));
                CommandResponse::ok(summary(context.session))
            }
            _ => CommandResponse::err("用法: add_pick <东> <北>"),
        }
    }
}

struct RemovePickCommand;

impl CommandHandler for RemovePickCommand {
    fn name(&self) -> &'static str {
        "remove_pick"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(index) = request.args.first().and_then(|arg| arg.parse::<usize>().ok()) else {
            return CommandResponse::err("用法: remove_pick <序号>");
        };
        match context.session.remove_at(index) {
            Some(_) => CommandResponse::ok(summary(context.session)),
            None => CommandResponse::err(format!("序号越界: {index}")),
        }
    }
}

struct UndoPickCommand;

impl CommandHandler for UndoPickCommand {
    fn name(&self) -> &'static str {
        "undo_pick"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.undo() {
            Ok(()) => CommandResponse::ok(summary(context.session)),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct RedoPickCommand;

impl CommandHandler for RedoPickCommand {
    fn name(&self) -> &'static str {
        "redo_pick"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.redo() {
            Ok(()) => CommandResponse::ok(summary(context.session)),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct ClearPicksCommand;

impl CommandHandler for ClearPicksCommand {
    fn name(&self) -> &'static str {
        "clear_picks"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.session.clear() {
            CommandResponse::ok("量测点已清空")
        } else {
            CommandResponse::ok("没有可清除的量测点")
        }
    }
}

struct ToggleMeasureModeCommand;

impl CommandHandler for ToggleMeasureModeCommand {
    fn name(&self) -> &'static str {
        "toggle_measure_mode"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let mode = context.session.toggle_mode();
        CommandResponse::ok(format!("量测模式: {}", mode.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MeasureMode;

    #[test]
    fn pick_undo_redo_commands_work() {
        let mut session = MeasurementSession::new();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        for (x, y) in [("0", "0"), ("3", "0"), ("3", "4")] {
            let response = bus.dispatch(&CommandRequest::with_args("add_pick", [x, y]), &mut context);
            assert!(response.success);
        }
        assert!((context.session.total_distance() - 7.0).abs() < 1e-12);

        let undo = bus.dispatch(&CommandRequest::new("undo_pick"), &mut context);
        assert!(undo.success);
        assert_eq!(context.session.len(), 2);

        let redo = bus.dispatch(&CommandRequest::new("redo_pick"), &mut context);
        assert!(redo.success);
        assert_eq!(context.session.len(), 3);

        let clear = bus.dispatch(&CommandRequest::new("clear_picks"), &mut context);
        assert!(clear.success);
        assert!(context.session.is_empty());

        let toggle = bus.dispatch(&CommandRequest::new("toggle_measure_mode"), &mut context);
        assert!(toggle.success);
        assert_eq!(context.session.mode(), MeasureMode::Area);
    }

    #[test]
    fn single_pick_reports_positive_zero() {
        let mut session = MeasurementSession::new();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        let response = bus.dispatch(&CommandRequest::with_args("add_pick", ["5", "5"]), &mut context);
        assert_eq!(response.message.as_deref(), Some("1 点，距离: 0.000"));
    }

    #[test]
    fn invalid_requests_fail_without_mutation() {
        let mut session = MeasurementSession::new();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        assert!(!bus.dispatch(&CommandRequest::new("undo_pick"), &mut context).success);
        assert!(!bus
            .dispatch(&CommandRequest::with_args("add_pick", ["1"]), &mut context)
            .success);
        assert!(!bus
            .dispatch(&CommandRequest::with_args("remove_pick", ["0"]), &mut context)
            .success);
        assert!(!bus.dispatch(&CommandRequest::new("focus"), &mut context).success);
        assert_eq!(context.session.undo_depth(), 0);
        assert_eq!(bus.available_commands().count(), 6);
    }
}
