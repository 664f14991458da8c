use crate::{
    body, controller::UserController, generic_json_response, upload::UploadStore, AppSettings,
};
use contracts::{messages, ErrorResult, Route};
use database::{DatabaseError, UserDatabase};
use hyper::{Body, Request, Response, StatusCode};
use serde::Serialize;
use std::{
    error::Error,
    fmt::{Debug, Display},
    sync::Arc,
};

pub type AppResult<T> = Result<T, AppError>;

pub struct App {
    user_controller: UserController,
    uploads: Arc<UploadStore>,
}

impl App {
    /// Connects the user database, creating its table if needed, and
    /// prepares the uploads directory.
    pub async fn new(settings: &AppSettings) -> AppResult<Self> {
        let user_db = Arc::new(
            UserDatabase::new(
                &settings.database_addr,
                settings.database_max_connections,
            )
            .await?,
        );
        user_db.ensure_schema().await?;

        let uploads = Arc::new(UploadStore::open(settings.uploads_dir.clone()).await?);
        info!("storing uploads in {:?}", uploads.dir());

        let user_controller = UserController::new(user_db);

        Ok(Self {
            user_controller,
            uploads,
        })
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Handle a single API request
    pub async fn handle(&self, route: Route, request: Request<Body>) -> Response<Body> {
        trace!("request: {:?}", request);

        match self.dispatch(route, request).await {
            Ok(response) => response,
            Err(error) => {
                error!(
                    "error handling '{}': {} (context: {:?})",
                    route, error, error.context
                );
                generic_json_response(
                    ErrorResult::new(error.public_message()),
                    error.status_code(),
                )
            }
        }
    }

    async fn dispatch(&self, route: Route, request: Request<Body>) -> AppResult<Response<Body>> {
        let response = match route {
            Route::Users => ok_json(self.user_controller.get_users().await?),
            Route::Register => {
                let (fields, avatar) = body::read_register_form(request, &self.uploads).await?;
                ok_json(self.user_controller.register(fields, avatar).await?)
            }
            Route::Login => {
                let fields = body::read_fields(request).await?;
                ok_json(self.user_controller.login(fields).await?)
            }
            Route::ResetPassword => {
                let fields = body::read_fields(request).await?;
                ok_json(self.user_controller.reset_password(fields).await?)
            }
            Route::DeleteAccount => {
                let fields = body::read_fields(request).await?;
                ok_json(self.user_controller.delete_account(fields).await?)
            }
        };

        Ok(response)
    }
}

fn ok_json<T>(body: T) -> Response<Body>
where
    T: Serialize,
{
    generic_json_response(body, StatusCode::OK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    /// The body could not be read as the declared content type
    InvalidRequest,
    /// Fields were present but not usable as text
    InvalidParams,
    Database,
    Filesystem,
    Multipart,
    /// A file arrived under a field other than `avatar`
    UnexpectedField,
}

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub message: String,
    pub context: Option<String>,
}

impl AppError {
    fn new(kind: AppErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
            context: None,
        }
    }

    pub fn with_context<T>(mut self, value: &T) -> Self
    where
        T: Debug,
    {
        self.context = Some(format!("{:?}", value));
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_owned();
        self
    }

    pub fn invalid_request() -> Self {
        Self::new(AppErrorKind::InvalidRequest, messages::INVALID_REQUEST_BODY)
    }

    pub fn invalid_params() -> Self {
        Self::new(AppErrorKind::InvalidParams, "invalid params")
    }

    pub fn database_error() -> Self {
        Self::new(AppErrorKind::Database, "database error")
    }

    pub fn filesystem_error() -> Self {
        Self::new(AppErrorKind::Filesystem, "filesystem error")
    }

    pub fn multipart_error() -> Self {
        Self::new(AppErrorKind::Multipart, "malformed multipart body")
    }

    pub fn unexpected_field(field_name: Option<&str>) -> Self {
        Self::new(
            AppErrorKind::UnexpectedField,
            &format!("unexpected file field: {:?}", field_name),
        )
    }

    /// Only malformed bodies are reported to the client as such, everything
    /// else is a server error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AppErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &str {
        match self.kind {
            AppErrorKind::InvalidRequest => &self.message,
            _ => messages::SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(db_error: DatabaseError) -> Self {
        AppError::database_error().with_context(&db_error)
    }
}

impl From<std::io::Error> for AppError {
    fn from(io_error: std::io::Error) -> Self {
        AppError::filesystem_error().with_context(&io_error)
    }
}

impl From<multer::Error> for AppError {
    fn from(multer_error: multer::Error) -> Self {
        AppError::multipart_error().with_context(&multer_error)
    }
}

impl From<hyper::Error> for AppError {
    fn from(hyper_error: hyper::Error) -> Self {
        AppError::invalid_request().with_context(&hyper_error)
    }
}

pub trait ParamsError: Error {}

impl<T> From<T> for AppError
where
    T: ParamsError,
{
    fn from(err: T) -> Self {
        AppError::invalid_params()
            .with_message(&err.to_string())
            .with_context(&err)
    }
}
