//! In-process mock of the managed runtime.
//!
//! Implements the `Runtime`/`RuntimeEnv` boundary over plain hash maps: every
//! managed reference is an id into an object table, method handles record the
//! class and name they were resolved against, and a scripted consumer decides
//! how callback invocations behave. Attach/detach bookkeeping is per thread
//! so the binding tests can assert symmetry.

use rawframe_bridge::{
    ClassHandle, MethodHandle, ObjectId, Runtime, RuntimeEnv, RuntimeError, RuntimeResult, Value,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

pub const CONSUMER_CLASS: &str = "test/Consumer";
pub const AUDIO_FRAME_CLASS: &str = "media/rawdata/AudioFrame";
pub const VIDEO_FRAME_CLASS: &str = "media/rawdata/VideoFrame";
pub const PIXEL_FORMAT_CLASS: &str = "media/rawdata/VideoPixelFormat";

const FRAME_METHODS: &[&str] = &["getType", "getTextureId", "getTextureMatrix"];
const FORMAT_METHODS: &[&str] = &["getValue"];

/// Scripted behavior of the managed consumer object.
pub trait MockConsumer: Send {
    /// Whether `name` resolves on the consumer class. Defaults to accepting
    /// everything; resolution-failure tests narrow it.
    fn has_method(&self, _name: &str) -> bool {
        true
    }

    fn invoke_bool(&mut self, env: &MockEnv, method: &str, args: &[Value]) -> bool;

    fn invoke_int(&mut self, _env: &MockEnv, _method: &str, _args: &[Value]) -> i32 {
        0
    }

    fn invoke_object(
        &mut self,
        _env: &MockEnv,
        _method: &str,
        _args: &[Value],
    ) -> Option<ObjectId> {
        None
    }
}

/// A consumer that keeps every frame and records nothing. Baseline for tests
/// that only care about marshaling side effects.
pub struct KeepAllConsumer;

impl MockConsumer for KeepAllConsumer {
    fn invoke_bool(&mut self, _env: &MockEnv, _method: &str, _args: &[Value]) -> bool {
        true
    }
}

enum ManagedValue {
    Consumer,
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
    Frame(FrameObject),
    FormatEnum(i32),
}

struct FrameObject {
    class: u64,
    args: Vec<Value>,
    type_code: i32,
    texture_id: i32,
    matrix: Option<ObjectId>,
}

struct MethodInfo {
    class: u64,
    name: String,
}

#[derive(Default)]
struct VmState {
    next_id: AtomicU64,
    attached: Mutex<HashSet<ThreadId>>,
    attach_count: AtomicUsize,
    detach_count: AtomicUsize,
    refuse_attach: AtomicBool,
    objects: Mutex<HashMap<u64, ManagedValue>>,
    classes: Mutex<HashMap<String, u64>>,
    methods: Mutex<HashMap<u64, MethodInfo>>,
    globals: Mutex<HashSet<u64>>,
    released_globals: Mutex<Vec<u64>>,
    bytes_allocated: AtomicUsize,
    floats_allocated: AtomicUsize,
    consumer_id: AtomicU64,
    consumer: Mutex<Option<Box<dyn MockConsumer>>>,
}

pub struct MockRuntime {
    state: Arc<VmState>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        let state = Arc::new(VmState::default());
        state.next_id.store(1, Ordering::SeqCst);
        Self { state }
    }

    /// Create the consumer object and install its scripted behavior.
    pub fn install_consumer(&self, consumer: Box<dyn MockConsumer>) -> ObjectId {
        self.state.class_id(CONSUMER_CLASS);
        let id = self.state.fresh_id();
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(id, ManagedValue::Consumer);
        self.state.consumer_id.store(id, Ordering::SeqCst);
        *self.state.consumer.lock().unwrap() = Some(consumer);
        ObjectId(id)
    }

    pub fn refuse_attach(&self, refuse: bool) {
        self.state.refuse_attach.store(refuse, Ordering::SeqCst);
    }

    pub fn attach_count(&self) -> usize {
        self.state.attach_count.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.state.detach_count.load(Ordering::SeqCst)
    }

    pub fn is_current_thread_attached(&self) -> bool {
        self.state
            .attached
            .lock()
            .unwrap()
            .contains(&std::thread::current().id())
    }

    pub fn live_globals(&self) -> usize {
        self.state.globals.lock().unwrap().len()
    }

    pub fn released_globals(&self) -> Vec<u64> {
        self.state.released_globals.lock().unwrap().clone()
    }

    pub fn byte_containers_allocated(&self) -> usize {
        self.state.bytes_allocated.load(Ordering::SeqCst)
    }

    pub fn float_containers_allocated(&self) -> usize {
        self.state.floats_allocated.load(Ordering::SeqCst)
    }

    /// Env handle without going through attach; for test-side inspection.
    pub fn env(&self) -> MockEnv {
        MockEnv {
            state: self.state.clone(),
        }
    }
}

impl VmState {
    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn class_id(&self, name: &str) -> u64 {
        let mut classes = self.classes.lock().unwrap();
        if let Some(&id) = classes.get(name) {
            return id;
        }
        let id = self.fresh_id();
        classes.insert(name.to_string(), id);
        id
    }

    fn class_name(&self, id: u64) -> Option<String> {
        self.classes
            .lock()
            .unwrap()
            .iter()
            .find(|(_, &v)| v == id)
            .map(|(k, _)| k.clone())
    }
}

pub struct MockEnv {
    state: Arc<VmState>,
}

impl MockEnv {
    fn method_name(&self, method: MethodHandle) -> RuntimeResult<(u64, String)> {
        let methods = self.state.methods.lock().unwrap();
        methods
            .get(&method.0)
            .map(|info| (info.class, info.name.clone()))
            .ok_or(RuntimeError::InvalidHandle)
    }

    fn with_consumer<T>(
        &self,
        f: impl FnOnce(&mut dyn MockConsumer, &MockEnv) -> T,
    ) -> RuntimeResult<T> {
        let mut guard = self.state.consumer.lock().unwrap();
        let consumer = guard
            .as_mut()
            .ok_or_else(|| RuntimeError::Invocation("no consumer installed".into()))?;
        let env = MockEnv {
            state: self.state.clone(),
        };
        Ok(f(consumer.as_mut(), &env))
    }

    /// Constructor arguments the bridge passed for a frame object.
    pub fn frame_args(&self, obj: ObjectId) -> Vec<Value> {
        match self.state.objects.lock().unwrap().get(&obj.0) {
            Some(ManagedValue::Frame(frame)) => frame.args.clone(),
            _ => panic!("not a frame object: {obj:?}"),
        }
    }

    /// Flip a frame object to a texture representation, as a consumer
    /// calling the managed setters would.
    pub fn set_frame_texture(
        &self,
        obj: ObjectId,
        type_code: i32,
        texture_id: i32,
        matrix: [f32; 16],
    ) {
        let matrix_id = self.state.fresh_id();
        let mut objects = self.state.objects.lock().unwrap();
        objects.insert(matrix_id, ManagedValue::Floats(matrix.to_vec()));
        self.state.floats_allocated.fetch_add(1, Ordering::SeqCst);
        match objects.get_mut(&obj.0) {
            Some(ManagedValue::Frame(frame)) => {
                frame.type_code = type_code;
                frame.texture_id = texture_id;
                frame.matrix = Some(ObjectId(matrix_id));
            }
            _ => panic!("not a frame object: {obj:?}"),
        }
    }

    /// Allocate a pixel-format enumeration instance for the preference query.
    pub fn new_format_enum(&self, code: i32) -> ObjectId {
        let id = self.state.fresh_id();
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(id, ManagedValue::FormatEnum(code));
        ObjectId(id)
    }

    /// Current contents of a byte container.
    pub fn container_bytes(&self, container: ObjectId) -> Vec<u8> {
        match self.state.objects.lock().unwrap().get(&container.0) {
            Some(ManagedValue::Bytes(data)) => data.clone(),
            _ => panic!("not a byte container: {container:?}"),
        }
    }
}

impl RuntimeEnv for MockEnv {
    fn find_class(&self, name: &str) -> RuntimeResult<ClassHandle> {
        match name {
            AUDIO_FRAME_CLASS | VIDEO_FRAME_CLASS | PIXEL_FORMAT_CLASS | CONSUMER_CLASS => {
                Ok(ClassHandle(self.state.class_id(name)))
            }
            _ => Err(RuntimeError::ClassNotFound(name.to_string())),
        }
    }

    fn object_class(&self, obj: ObjectId) -> RuntimeResult<ClassHandle> {
        let objects = self.state.objects.lock().unwrap();
        match objects.get(&obj.0) {
            Some(ManagedValue::Consumer) => Ok(ClassHandle(self.state.class_id(CONSUMER_CLASS))),
            Some(ManagedValue::Frame(frame)) => Ok(ClassHandle(frame.class)),
            Some(ManagedValue::FormatEnum(_)) => {
                Ok(ClassHandle(self.state.class_id(PIXEL_FORMAT_CLASS)))
            }
            Some(_) => Err(RuntimeError::WrongKind("object")),
            None => Err(RuntimeError::InvalidHandle),
        }
    }

    fn resolve_method(&self, class: ClassHandle, name: &str) -> RuntimeResult<MethodHandle> {
        let class_name = self
            .state
            .class_name(class.0)
            .ok_or(RuntimeError::InvalidHandle)?;
        let known = match class_name.as_str() {
            CONSUMER_CLASS => {
                let guard = self.state.consumer.lock().unwrap();
                guard.as_ref().is_some_and(|c| c.has_method(name))
            }
            AUDIO_FRAME_CLASS | VIDEO_FRAME_CLASS => FRAME_METHODS.contains(&name),
            PIXEL_FORMAT_CLASS => FORMAT_METHODS.contains(&name),
            _ => false,
        };
        if !known {
            return Err(RuntimeError::MethodNotFound(format!(
                "{class_name}.{name}"
            )));
        }
        let id = self.state.fresh_id();
        self.state.methods.lock().unwrap().insert(
            id,
            MethodInfo {
                class: class.0,
                name: name.to_string(),
            },
        );
        Ok(MethodHandle(id))
    }

    fn resolve_constructor(&self, class: ClassHandle) -> RuntimeResult<MethodHandle> {
        let class_name = self
            .state
            .class_name(class.0)
            .ok_or(RuntimeError::InvalidHandle)?;
        if class_name != AUDIO_FRAME_CLASS && class_name != VIDEO_FRAME_CLASS {
            return Err(RuntimeError::MethodNotFound(format!("{class_name}.<init>")));
        }
        let id = self.state.fresh_id();
        self.state.methods.lock().unwrap().insert(
            id,
            MethodInfo {
                class: class.0,
                name: "<init>".to_string(),
            },
        );
        Ok(MethodHandle(id))
    }

    fn new_object(
        &self,
        class: ClassHandle,
        ctor: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<ObjectId> {
        let (ctor_class, name) = self.method_name(ctor)?;
        if ctor_class != class.0 || name != "<init>" {
            return Err(RuntimeError::InvalidHandle);
        }
        let class_name = self
            .state
            .class_name(class.0)
            .ok_or(RuntimeError::InvalidHandle)?;
        let frame = match class_name.as_str() {
            VIDEO_FRAME_CLASS => {
                if args.len() != 14 {
                    return Err(RuntimeError::Invocation(format!(
                        "video frame constructor takes 14 args, got {}",
                        args.len()
                    )));
                }
                let type_code = match args[0] {
                    Value::Int(code) => code,
                    _ => return Err(RuntimeError::WrongKind("int")),
                };
                let texture_id = match args[10] {
                    Value::Int(id) => id,
                    _ => return Err(RuntimeError::WrongKind("int")),
                };
                let matrix = match args[11] {
                    Value::Object(matrix) => matrix,
                    _ => return Err(RuntimeError::WrongKind("object")),
                };
                FrameObject {
                    class: class.0,
                    args: args.to_vec(),
                    type_code,
                    texture_id,
                    matrix,
                }
            }
            AUDIO_FRAME_CLASS => {
                if args.len() != 8 {
                    return Err(RuntimeError::Invocation(format!(
                        "audio frame constructor takes 8 args, got {}",
                        args.len()
                    )));
                }
                let type_code = match args[0] {
                    Value::Int(code) => code,
                    _ => return Err(RuntimeError::WrongKind("int")),
                };
                FrameObject {
                    class: class.0,
                    args: args.to_vec(),
                    type_code,
                    texture_id: 0,
                    matrix: None,
                }
            }
            _ => return Err(RuntimeError::InvalidHandle),
        };
        let id = self.state.fresh_id();
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(id, ManagedValue::Frame(frame));
        Ok(ObjectId(id))
    }

    fn new_byte_container(&self, len: usize) -> RuntimeResult<ObjectId> {
        let id = self.state.fresh_id();
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(id, ManagedValue::Bytes(vec![0; len]));
        self.state.bytes_allocated.fetch_add(1, Ordering::SeqCst);
        Ok(ObjectId(id))
    }

    fn container_len(&self, container: ObjectId) -> RuntimeResult<usize> {
        match self.state.objects.lock().unwrap().get(&container.0) {
            Some(ManagedValue::Bytes(data)) => Ok(data.len()),
            Some(_) => Err(RuntimeError::WrongKind("byte container")),
            None => Err(RuntimeError::InvalidHandle),
        }
    }

    fn write_bytes(&self, container: ObjectId, data: &[u8]) -> RuntimeResult<()> {
        match self.state.objects.lock().unwrap().get_mut(&container.0) {
            Some(ManagedValue::Bytes(dest)) => {
                if data.len() > dest.len() {
                    return Err(RuntimeError::Invocation(
                        "write past end of byte container".into(),
                    ));
                }
                dest[..data.len()].copy_from_slice(data);
                Ok(())
            }
            Some(_) => Err(RuntimeError::WrongKind("byte container")),
            None => Err(RuntimeError::InvalidHandle),
        }
    }

    fn read_bytes(&self, container: ObjectId, out: &mut [u8]) -> RuntimeResult<()> {
        match self.state.objects.lock().unwrap().get(&container.0) {
            Some(ManagedValue::Bytes(data)) => {
                if out.len() > data.len() {
                    return Err(RuntimeError::Invocation(
                        "read past end of byte container".into(),
                    ));
                }
                out.copy_from_slice(&data[..out.len()]);
                Ok(())
            }
            Some(_) => Err(RuntimeError::WrongKind("byte container")),
            None => Err(RuntimeError::InvalidHandle),
        }
    }

    fn new_float_container(&self, data: &[f32]) -> RuntimeResult<ObjectId> {
        let id = self.state.fresh_id();
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(id, ManagedValue::Floats(data.to_vec()));
        self.state.floats_allocated.fetch_add(1, Ordering::SeqCst);
        Ok(ObjectId(id))
    }

    fn read_floats(&self, container: ObjectId, out: &mut [f32]) -> RuntimeResult<()> {
        match self.state.objects.lock().unwrap().get(&container.0) {
            Some(ManagedValue::Floats(data)) => {
                if out.len() > data.len() {
                    return Err(RuntimeError::Invocation(
                        "read past end of float container".into(),
                    ));
                }
                out.copy_from_slice(&data[..out.len()]);
                Ok(())
            }
            Some(_) => Err(RuntimeError::WrongKind("float container")),
            None => Err(RuntimeError::InvalidHandle),
        }
    }

    fn invoke_bool(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<bool> {
        let (_, name) = self.method_name(method)?;
        let is_consumer = matches!(
            self.state.objects.lock().unwrap().get(&target.0),
            Some(ManagedValue::Consumer)
        );
        if !is_consumer {
            return Err(RuntimeError::Invocation(format!(
                "boolean method {name} on non-consumer object"
            )));
        }
        self.with_consumer(|consumer, env| consumer.invoke_bool(env, &name, args))
    }

    fn invoke_int(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<i32> {
        let (_, name) = self.method_name(method)?;
        enum Kind {
            Consumer,
            Frame(i32, i32),
            Format(i32),
        }
        let kind = match self.state.objects.lock().unwrap().get(&target.0) {
            Some(ManagedValue::Consumer) => Kind::Consumer,
            Some(ManagedValue::Frame(frame)) => Kind::Frame(frame.type_code, frame.texture_id),
            Some(ManagedValue::FormatEnum(code)) => Kind::Format(*code),
            Some(_) => return Err(RuntimeError::WrongKind("object")),
            None => return Err(RuntimeError::InvalidHandle),
        };
        match kind {
            Kind::Consumer => self.with_consumer(|consumer, env| consumer.invoke_int(env, &name, args)),
            Kind::Frame(type_code, texture_id) => match name.as_str() {
                "getType" => Ok(type_code),
                "getTextureId" => Ok(texture_id),
                other => Err(RuntimeError::MethodNotFound(other.to_string())),
            },
            Kind::Format(code) => match name.as_str() {
                "getValue" => Ok(code),
                other => Err(RuntimeError::MethodNotFound(other.to_string())),
            },
        }
    }

    fn invoke_object(
        &self,
        target: ObjectId,
        method: MethodHandle,
        args: &[Value],
    ) -> RuntimeResult<ObjectId> {
        let (_, name) = self.method_name(method)?;
        enum Kind {
            Consumer,
            FrameMatrix(Option<ObjectId>),
        }
        let kind = match self.state.objects.lock().unwrap().get(&target.0) {
            Some(ManagedValue::Consumer) => Kind::Consumer,
            Some(ManagedValue::Frame(frame)) => Kind::FrameMatrix(frame.matrix),
            Some(_) => return Err(RuntimeError::WrongKind("object")),
            None => return Err(RuntimeError::InvalidHandle),
        };
        match kind {
            Kind::Consumer => self
                .with_consumer(|consumer, env| consumer.invoke_object(env, &name, args))?
                .ok_or_else(|| RuntimeError::Invocation(format!("{name} returned null"))),
            Kind::FrameMatrix(matrix) => match name.as_str() {
                "getTextureMatrix" => {
                    matrix.ok_or_else(|| RuntimeError::Invocation("frame has no matrix".into()))
                }
                other => Err(RuntimeError::MethodNotFound(other.to_string())),
            },
        }
    }

    fn new_global_ref(&self, obj: ObjectId) -> RuntimeResult<ObjectId> {
        if !self.state.objects.lock().unwrap().contains_key(&obj.0) {
            return Err(RuntimeError::InvalidHandle);
        }
        self.state.globals.lock().unwrap().insert(obj.0);
        Ok(obj)
    }

    fn delete_global_ref(&self, obj: ObjectId) {
        if self.state.globals.lock().unwrap().remove(&obj.0) {
            self.state.released_globals.lock().unwrap().push(obj.0);
        }
    }

    fn delete_local_ref(&self, _obj: ObjectId) {}
}

impl Runtime for MockRuntime {
    type Env = MockEnv;

    fn current_thread_env(&self) -> Option<MockEnv> {
        let attached = self.state.attached.lock().unwrap();
        if attached.contains(&std::thread::current().id()) {
            Some(MockEnv {
                state: self.state.clone(),
            })
        } else {
            None
        }
    }

    fn attach_current_thread(&self) -> RuntimeResult<MockEnv> {
        if self.state.refuse_attach.load(Ordering::SeqCst) {
            return Err(RuntimeError::AttachFailed);
        }
        self.state
            .attached
            .lock()
            .unwrap()
            .insert(std::thread::current().id());
        self.state.attach_count.fetch_add(1, Ordering::SeqCst);
        Ok(MockEnv {
            state: self.state.clone(),
        })
    }

    fn detach_current_thread(&self) {
        self.state
            .attached
            .lock()
            .unwrap()
            .remove(&std::thread::current().id());
        self.state.detach_count.fetch_add(1, Ordering::SeqCst);
    }
}
