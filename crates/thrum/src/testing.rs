//! A hand-written `echo` service for unit tests.
//!
//! ```thrift
//! service Echo {
//!   string echo(1: string msg)
//!   oneway void ping()
//! }
//! ```

use thrum_protocol::{
    FieldSpec, MethodSpec, ProtocolReader, ProtocolWriter, Requiredness,
    Result, ServiceSpec, StructKind, StructSpec, TType, ThriftStruct,
    TypeSpec, read_struct, require, write_field, write_optional_field,
    write_struct,
};

use crate::method::{MethodResult, NoExceptions, Outcome, ThriftMethod};

pub static ECHO_ARGS_SPEC: StructSpec = StructSpec {
    name: "echo_args",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 1,
        name: "msg",
        ty: TypeSpec::String,
        requiredness: Requiredness::Required,
    }],
};

pub static ECHO_RESULT_SPEC: StructSpec = StructSpec {
    name: "echo_result",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 0,
        name: "success",
        ty: TypeSpec::String,
        requiredness: Requiredness::Optional,
    }],
};

pub static EMPTY_SPEC: StructSpec = StructSpec {
    name: "ping_args",
    kind: StructKind::Struct,
    fields: &[],
};

pub static ECHO_SERVICE: ServiceSpec = ServiceSpec {
    name: "Echo",
    parent: None,
    methods: &[
        MethodSpec {
            name: "echo",
            args: &ECHO_ARGS_SPEC,
            result: &ECHO_RESULT_SPEC,
            oneway: false,
        },
        MethodSpec {
            name: "ping",
            args: &EMPTY_SPEC,
            result: &EMPTY_SPEC,
            oneway: true,
        },
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub struct EchoArgs {
    pub msg: String,
}

impl ThriftStruct for EchoArgs {
    fn spec() -> &'static StructSpec {
        &ECHO_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "echo_args", |out| write_field(out, 1, &self.msg))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut msg = None;
        read_struct(input, |input, field| match field.id {
            1 if field.ttype == TType::String => {
                msg = Some(input.read_string()?);
                Ok(())
            }
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            msg: require(msg, "msg", "echo_args")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchoResult {
    pub success: Option<String>,
}

impl ThriftStruct for EchoResult {
    fn spec() -> &'static StructSpec {
        &ECHO_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "echo_result", |out| {
            write_optional_field(out, 0, &self.success)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut result = Self::default();
        read_struct(input, |input, field| match field.id {
            0 if field.ttype == TType::String => {
                result.success = Some(input.read_string()?);
                Ok(())
            }
            _ => input.skip(field.ttype),
        })?;
        Ok(result)
    }
}

impl MethodResult for EchoResult {
    type Success = String;
    type Error = NoExceptions;

    fn from_success(value: String) -> Self {
        Self {
            success: Some(value),
        }
    }

    fn from_error(error: NoExceptions) -> Self {
        match error {}
    }

    fn into_outcome(self) -> Outcome<String, NoExceptions> {
        match self.success {
            Some(value) => Outcome::Success(value),
            None => Outcome::Missing,
        }
    }
}

pub struct Echo;

impl ThriftMethod for Echo {
    const NAME: &'static str = "echo";
    type Args = EchoArgs;
    type Result = EchoResult;
    type Success = String;
    type Error = NoExceptions;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Empty;

impl ThriftStruct for Empty {
    fn spec() -> &'static StructSpec {
        &EMPTY_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "ping_args", |_| Ok(()))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        read_struct(input, |input, field| input.skip(field.ttype))?;
        Ok(Self)
    }
}

impl MethodResult for Empty {
    type Success = ();
    type Error = NoExceptions;

    fn from_success(_: ()) -> Self {
        Self
    }

    fn from_error(error: NoExceptions) -> Self {
        match error {}
    }

    fn into_outcome(self) -> Outcome<(), NoExceptions> {
        Outcome::Success(())
    }
}

pub struct Ping;

impl ThriftMethod for Ping {
    const NAME: &'static str = "ping";
    const ONEWAY: bool = true;
    type Args = Empty;
    type Result = Empty;
    type Success = ();
    type Error = NoExceptions;
}
