// Messages of the capture artifact and of the symbol/module exchange.
//
// Written in the shape prost-build emits so the crate builds without protoc.
// Field tags are part of the artifact format; never renumber them.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CaptureHeader {
    #[prost(string, tag = "1")]
    pub version: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessInfo {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(double, tag = "3")]
    pub cpu_usage: f64,
    #[prost(string, tag = "4")]
    pub full_path: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub command_line: ::prost::alloc::string::String,
    #[prost(bool, tag = "6")]
    pub is_64_bit: bool,
}
/// A module (executable or shared object) mapped into a process.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct ModuleInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub file_path: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub file_size: u64,
    #[prost(uint64, tag = "4")]
    pub address_start: u64,
    #[prost(uint64, tag = "5")]
    pub address_end: u64,
    /// Hex encoded GNU build-id, empty when the module carries none.
    #[prost(string, tag = "6")]
    pub build_id: ::prost::alloc::string::String,
    #[prost(uint64, tag = "7")]
    pub load_bias: u64,
    #[prost(string, tag = "8")]
    pub soname: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct SymbolInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub demangled_name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub address: u64,
    #[prost(uint64, tag = "4")]
    pub size: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleSymbols {
    #[prost(message, repeated, tag = "1")]
    pub symbol_infos: ::prost::alloc::vec::Vec<SymbolInfo>,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct LineInfo {
    #[prost(string, tag = "1")]
    pub source_file: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub source_line: u32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionInfo {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub pretty_name: ::prost::alloc::string::String,
    /// ELF virtual address, i.e. the address before load bias is removed.
    #[prost(uint64, tag = "3")]
    pub address: u64,
    #[prost(uint64, tag = "4")]
    pub size: u64,
    #[prost(string, tag = "5")]
    pub loaded_module_path: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub file: ::prost::alloc::string::String,
    #[prost(uint32, tag = "7")]
    pub line: u32,
    #[prost(enumeration = "FunctionType", tag = "8")]
    pub function_type: i32,
}
/// Nested message and enum types in `FunctionInfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FunctionType {
    Regular = 0,
    ZoneStart = 1,
    ZoneStop = 2,
    Alloc = 3,
    Free = 4,
    Realloc = 5,
    OutputDebugString = 6,
}
impl FunctionType {
    pub const ALL: [FunctionType; 7] = [
        FunctionType::Regular,
        FunctionType::ZoneStart,
        FunctionType::ZoneStop,
        FunctionType::Alloc,
        FunctionType::Free,
        FunctionType::Realloc,
        FunctionType::OutputDebugString,
    ];
}
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Message)]
pub struct TracepointInfo {
    #[prost(string, tag = "1")]
    pub category: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub tracepoint_info_key: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TracepointEventInfo {
    #[prost(int32, tag = "1")]
    pub pid: i32,
    #[prost(int32, tag = "2")]
    pub tid: i32,
    #[prost(uint64, tag = "3")]
    pub time: u64,
    #[prost(int32, tag = "4")]
    pub cpu: i32,
    #[prost(uint64, tag = "5")]
    pub tracepoint_info_key: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LinuxAddressInfo {
    #[prost(uint64, tag = "1")]
    pub absolute_address: u64,
    #[prost(string, tag = "2")]
    pub module_path: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub function_name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "4")]
    pub offset_in_function: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ThreadStateSliceInfo {
    #[prost(int32, tag = "1")]
    pub tid: i32,
    #[prost(enumeration = "ThreadState", tag = "2")]
    pub thread_state: i32,
    #[prost(uint64, tag = "3")]
    pub begin_timestamp_ns: u64,
    #[prost(uint64, tag = "4")]
    pub end_timestamp_ns: u64,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ThreadState {
    Running = 0,
    Runnable = 1,
    InterruptibleSleep = 2,
    UninterruptibleSleep = 3,
    Stopped = 4,
    Traced = 5,
    Dead = 6,
    Zombie = 7,
    Parked = 8,
    Idle = 9,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallstackInfo {
    /// Content hash of `data`, the key of the unique callstack table.
    #[prost(uint64, tag = "1")]
    pub hash: u64,
    #[prost(uint64, repeated, tag = "2")]
    pub data: ::prost::alloc::vec::Vec<u64>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallstackEvent {
    #[prost(uint64, tag = "1")]
    pub time: u64,
    #[prost(uint64, tag = "2")]
    pub callstack_hash: u64,
    #[prost(int32, tag = "3")]
    pub thread_id: i32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimerInfo {
    #[prost(int32, tag = "1")]
    pub process_id: i32,
    #[prost(int32, tag = "2")]
    pub thread_id: i32,
    #[prost(uint64, tag = "3")]
    pub start: u64,
    #[prost(uint64, tag = "4")]
    pub end: u64,
    #[prost(uint32, tag = "5")]
    pub depth: u32,
    /// Absolute address of the hooked function, or the zone id for manual zones.
    #[prost(uint64, tag = "6")]
    pub function_address: u64,
    #[prost(uint64, tag = "7")]
    pub user_data_key: u64,
    #[prost(int32, tag = "8")]
    pub processor: i32,
    #[prost(enumeration = "TimerType", tag = "9")]
    pub r#type: i32,
    #[prost(uint64, repeated, tag = "10")]
    pub registers: ::prost::alloc::vec::Vec<u64>,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TimerType {
    None = 0,
    CoreActivity = 1,
    Introspection = 2,
    GpuActivity = 3,
}
/// Everything of a capture except the timer tail, which follows this message
/// in the byte stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CaptureInfo {
    #[prost(message, repeated, tag = "1")]
    pub selected_functions: ::prost::alloc::vec::Vec<FunctionInfo>,
    #[prost(message, optional, tag = "2")]
    pub process: ::core::option::Option<ProcessInfo>,
    #[prost(message, repeated, tag = "3")]
    pub modules: ::prost::alloc::vec::Vec<ModuleInfo>,
    #[prost(btree_map = "int32, string", tag = "4")]
    pub thread_names: ::prost::alloc::collections::BTreeMap<i32, ::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "5")]
    pub address_infos: ::prost::alloc::vec::Vec<LinuxAddressInfo>,
    #[prost(message, repeated, tag = "6")]
    pub callstacks: ::prost::alloc::vec::Vec<CallstackInfo>,
    #[prost(message, repeated, tag = "7")]
    pub callstack_events: ::prost::alloc::vec::Vec<CallstackEvent>,
    #[prost(btree_map = "uint64, string", tag = "8")]
    pub key_to_string: ::prost::alloc::collections::BTreeMap<u64, ::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "9")]
    pub tracepoint_infos: ::prost::alloc::vec::Vec<TracepointInfo>,
    #[prost(message, repeated, tag = "10")]
    pub tracepoint_event_infos: ::prost::alloc::vec::Vec<TracepointEventInfo>,
    #[prost(message, repeated, tag = "11")]
    pub thread_state_slices: ::prost::alloc::vec::Vec<ThreadStateSliceInfo>,
}
