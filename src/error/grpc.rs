//! gRPC 错误处理
//!
//! 将 FlareError 转换为 tonic::Status，内部错误只携带固定文案

use super::{ErrorCode, FlareError, LocalizedError};
use tonic::{Code, Status};

/// gRPC 结果类型
pub type GrpcResult<T> = std::result::Result<T, Status>;

/// 将 FlareError 结果转换为 gRPC 结果
pub trait GrpcErrorExt<T> {
    fn to_status(self) -> GrpcResult<T>;
}

impl<T> GrpcErrorExt<T> for super::Result<T> {
    fn to_status(self) -> GrpcResult<T> {
        self.map_err(Status::from)
    }
}

impl From<FlareError> for Status {
    fn from(err: FlareError) -> Self {
        err.to_localized().into()
    }
}

impl From<LocalizedError> for Status {
    fn from(err: LocalizedError) -> Self {
        let mut status = Status::new(map_error_code_to_grpc(err.code), err.public_reason());

        // 添加错误代码到 metadata
        if let Ok(value) = err.code.as_str().parse() {
            status.metadata_mut().insert("error-code", value);
        }
        status
    }
}

/// 将错误代码映射到 gRPC 状态码
fn map_error_code_to_grpc(code: ErrorCode) -> Code {
    match code {
        // 会话相关
        ErrorCode::AuthenticationRequired | ErrorCode::TokenExpired => Code::Unauthenticated,

        ErrorCode::SessionNotFound => Code::NotFound,

        ErrorCode::OtpSendTooFrequent => Code::ResourceExhausted,

        ErrorCode::OtpExpired
        | ErrorCode::OtpInvalid
        | ErrorCode::CaptchaInvalid
        | ErrorCode::SceneNotFound
        | ErrorCode::CaptchaEmpty
        | ErrorCode::InvalidParameter => Code::InvalidArgument,

        ErrorCode::ServiceUnavailable => Code::Unavailable,

        ErrorCode::OperationTimeout => Code::DeadlineExceeded,

        ErrorCode::OperationCancelled => Code::Cancelled,

        ErrorCode::OtpSendFailed
        | ErrorCode::InternalError
        | ErrorCode::ConfigurationError
        | ErrorCode::TemplateNotConfigured
        | ErrorCode::SerializationError
        | ErrorCode::DeserializationError => Code::Internal,

        ErrorCode::UnknownError => Code::Unknown,
    }
}
