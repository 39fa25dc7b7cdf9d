pub mod user;

pub use user::{
    AuthUser, ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse, Pagination,
    ResponsePagination, ResponseUser, Role, Status, TerminateUserRequest, UpdateUserRequest, User,
    UserDetails,
};
