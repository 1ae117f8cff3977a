// AST-native algebra, organized by concern
pub mod arithmetic;
pub mod calculus_ast;
pub mod expr_form;
pub mod laplace_ast;
pub mod ode_ast;
pub mod polynomial;
pub mod simplify;
pub mod solve_ast;
