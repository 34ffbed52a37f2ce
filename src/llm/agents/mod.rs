pub mod tool_call;
