//! The unit of dispatch: one controller paired with one of its actions.

use std::fmt;
use std::sync::Arc;

use super::action::ActionType;
use super::controller::ControllerType;
use super::url::merge_route;

/// The `(controller, action)` pair one dispatch runs for.
#[derive(Clone)]
pub struct RoutingContext {
    controller: Arc<ControllerType>,
    action: Arc<ActionType>,
}

impl RoutingContext {
    pub fn new(controller: Arc<ControllerType>, action: Arc<ActionType>) -> Self {
        Self { controller, action }
    }

    pub fn controller_type(&self) -> &Arc<ControllerType> { &self.controller }
    pub fn action_type(&self) -> &Arc<ActionType> { &self.action }

    /// Controller prefix and action suffix joined with a single `/`.
    pub fn route(&self) -> String {
        merge_route(&self.controller.descriptor().route(), self.action.descriptor().route_template())
    }
}

/// `Controller.method`
impl fmt::Display for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.controller.name(), self.action.method_name())
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingContext")
            .field("action", &self.to_string())
            .field("route", &self.route())
            .finish()
    }
}
