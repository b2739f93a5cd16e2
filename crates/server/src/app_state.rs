use dispatch::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub secret: String,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, secret: impl Into<String>) -> Self {
        Self {
            dispatcher,
            secret: secret.into(),
        }
    }
}
