use std::sync::Arc;

use async_trait::async_trait;
use tandem_model::{
    ComputerAction, ComputerEnvironment, ModelTool, MouseButton, Point,
};

use super::Error;

/// A computer the model can control through screenshots and input events.
#[async_trait]
pub trait Computer: Send + Sync {
    /// Returns the environment of the computer.
    fn environment(&self) -> ComputerEnvironment;

    /// Returns the screen width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Takes a screenshot and returns it as a base64-encoded PNG.
    async fn screenshot(&self) -> Result<String, Error>;

    /// Clicks at the position.
    async fn click(
        &self,
        x: i64,
        y: i64,
        button: MouseButton,
    ) -> Result<(), Error>;

    /// Double clicks at the position.
    async fn double_click(&self, x: i64, y: i64) -> Result<(), Error>;

    /// Scrolls at the position.
    async fn scroll(
        &self,
        x: i64,
        y: i64,
        scroll_x: i64,
        scroll_y: i64,
    ) -> Result<(), Error>;

    /// Types the text.
    async fn type_text(&self, text: &str) -> Result<(), Error>;

    /// Waits for a moment.
    async fn wait(&self) -> Result<(), Error>;

    /// Moves the mouse to the position.
    async fn move_to(&self, x: i64, y: i64) -> Result<(), Error>;

    /// Presses the keys together.
    async fn keypress(&self, keys: &[String]) -> Result<(), Error>;

    /// Drags the mouse along the path.
    async fn drag(&self, path: &[Point]) -> Result<(), Error>;
}

/// Lets the model control a [`Computer`].
#[derive(Clone)]
pub struct ComputerTool {
    computer: Arc<dyn Computer>,
}

impl ComputerTool {
    /// Creates the tool for the given computer.
    #[inline]
    pub fn new<C: Computer + 'static>(computer: C) -> Self {
        Self {
            computer: Arc::new(computer),
        }
    }

    /// Describes this tool for the model.
    pub fn spec(&self) -> ModelTool {
        ModelTool::Computer {
            environment: self.computer.environment(),
            dimensions: self.computer.dimensions(),
        }
    }

    /// Performs the action, then returns a screenshot as a data URL.
    pub async fn perform(
        &self,
        action: &ComputerAction,
    ) -> Result<String, Error> {
        let computer = &self.computer;
        match action {
            ComputerAction::Click { x, y, button } => {
                computer.click(*x, *y, *button).await?
            }
            ComputerAction::DoubleClick { x, y } => {
                computer.double_click(*x, *y).await?
            }
            ComputerAction::Drag { path } => computer.drag(path).await?,
            ComputerAction::Keypress { keys } => computer.keypress(keys).await?,
            ComputerAction::Move { x, y } => computer.move_to(*x, *y).await?,
            ComputerAction::Screenshot => {}
            ComputerAction::Scroll {
                x,
                y,
                scroll_x,
                scroll_y,
            } => computer.scroll(*x, *y, *scroll_x, *scroll_y).await?,
            ComputerAction::Type { text } => computer.type_text(text).await?,
            ComputerAction::Wait => computer.wait().await?,
        }

        let screenshot = computer.screenshot().await?;
        Ok(format!("data:image/png;base64,{screenshot}"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records every action it performs.
    #[derive(Default)]
    pub struct RecordingComputer {
        pub actions: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Computer for RecordingComputer {
        fn environment(&self) -> ComputerEnvironment {
            ComputerEnvironment::Browser
        }

        fn dimensions(&self) -> (u32, u32) {
            (1024, 768)
        }

        async fn screenshot(&self) -> Result<String, Error> {
            self.actions.lock().push("screenshot".to_owned());
            Ok("c2NyZWVu".to_owned())
        }

        async fn click(
            &self,
            x: i64,
            y: i64,
            button: MouseButton,
        ) -> Result<(), Error> {
            self.actions.lock().push(format!("click {x} {y} {button:?}"));
            Ok(())
        }

        async fn double_click(&self, x: i64, y: i64) -> Result<(), Error> {
            self.actions.lock().push(format!("double_click {x} {y}"));
            Ok(())
        }

        async fn scroll(
            &self,
            x: i64,
            y: i64,
            scroll_x: i64,
            scroll_y: i64,
        ) -> Result<(), Error> {
            self.actions
                .lock()
                .push(format!("scroll {x} {y} {scroll_x} {scroll_y}"));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<(), Error> {
            self.actions.lock().push(format!("type {text}"));
            Ok(())
        }

        async fn wait(&self) -> Result<(), Error> {
            self.actions.lock().push("wait".to_owned());
            Ok(())
        }

        async fn move_to(&self, x: i64, y: i64) -> Result<(), Error> {
            self.actions.lock().push(format!("move {x} {y}"));
            Ok(())
        }

        async fn keypress(&self, keys: &[String]) -> Result<(), Error> {
            self.actions.lock().push(format!("keypress {}", keys.join("+")));
            Ok(())
        }

        async fn drag(&self, path: &[Point]) -> Result<(), Error> {
            Err(Error::permission_denied()
                .with_reason(format!("drag along {} points", path.len())))
        }
    }

    #[tokio::test]
    async fn test_perform() {
        let computer = RecordingComputer::default();
        let actions = Arc::clone(&computer.actions);
        let tool = ComputerTool::new(computer);

        let url = tool
            .perform(&ComputerAction::Click {
                x: 1,
                y: 2,
                button: MouseButton::Left,
            })
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,c2NyZWVu");
        assert_eq!(*actions.lock(), ["click 1 2 Left", "screenshot"]);

        let err = tool
            .perform(&ComputerAction::Drag { path: vec![] })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::tool::ErrorKind::PermissionDenied);
        assert!(matches!(tool.spec(), ModelTool::Computer { .. }));
    }
}
