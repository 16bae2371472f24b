use std::sync::Arc;

use crate::recognizer::Recognizer;

#[derive(Clone)]
pub struct AppState {
    pub recognizer: Arc<Recognizer>,
}

impl AppState {
    pub fn new(recognizer: Recognizer) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
        }
    }
}
