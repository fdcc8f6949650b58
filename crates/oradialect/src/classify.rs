//! Native error classification.
//!
//! Classification is a typed lookup on the ORA code. The message text is
//! carried along for humans but never inspected, so results do not depend on
//! the client locale or driver version.

use crate::error::{ClassifiedError, DbError, ErrorContext, ErrorKind, OrmError};

/// ORA codes grouped by canonical kind.
const DUPLICATE_KEY: &[i32] = &[
    1,     // unique constraint violated
    38911, // unique constraint violated (DML error logging)
];

const FOREIGN_KEY: &[i32] = &[
    2291, // parent key not found
    2292, // child record found
    2266, // unique/primary keys referenced by enabled foreign keys
];

const NOT_NULL: &[i32] = &[
    1400, // cannot insert NULL
    1407, // cannot update to NULL
];

const CONNECTION: &[i32] = &[
    1012,  // not logged on
    1033,  // initialization or shutdown in progress
    1034,  // ORACLE not available
    1089,  // immediate shutdown in progress
    3113,  // end-of-file on communication channel
    3114,  // not connected to ORACLE
    3135,  // connection lost contact
    12500, // listener failed to start a dedicated server process
    12505, // listener does not currently know of SID
    12514, // listener does not currently know of service
    12528, // all appropriate instances are blocking new connections
    12537, // TNS connection closed
    12541, // TNS no listener
    12543, // TNS destination host unreachable
    12545, // connect failed because target host or object does not exist
    12547, // TNS lost contact
    12560, // TNS protocol adapter error
    28000, // account is locked
    1017,  // invalid username/password
];

const TIMEOUT: &[i32] = &[
    1013,  // user requested cancel of current operation
    12170, // TNS connect timeout
    51,    // timeout occurred while waiting for a resource
    30006, // resource busy; acquire with WAIT timeout expired
    3136,  // inbound connection timed out
    54,    // resource busy and acquire with NOWAIT specified or timeout expired
];

const SYNTAX_OR_UNSUPPORTED: &[i32] = &[
    900,  // invalid SQL statement
    901,  // invalid CREATE command
    902,  // invalid datatype
    903,  // invalid table name
    904,  // invalid identifier
    905,  // missing keyword
    906,  // missing left parenthesis
    907,  // missing right parenthesis
    908,  // missing NULL keyword
    909,  // invalid number of arguments
    911,  // invalid character
    917,  // missing comma
    918,  // column ambiguously defined
    921,  // unexpected end of SQL command
    923,  // FROM keyword not found where expected
    924,  // missing BY keyword
    925,  // missing INTO keyword
    926,  // missing VALUES keyword
    927,  // missing equal sign
    928,  // missing SELECT keyword
    933,  // SQL command not properly ended
    936,  // missing expression
    937,  // not a single-group group function
    942,  // table or view does not exist
    979,  // not a GROUP BY expression
    1008, // not all variables bound
    1036, // illegal variable name/number
    1735, // invalid ALTER TABLE option
    1747, // invalid user.table.column specification
    2000, // missing keyword
    3001, // unimplemented feature
    439,  // feature not enabled
    22818, // subquery expressions not allowed here
    38104, // columns referenced in the ON clause cannot be updated
];

/// Classify an ORA code. `None` (no code available) is `Unknown`.
pub fn classify_code(code: Option<i32>) -> ErrorKind {
    let Some(code) = code else {
        return ErrorKind::Unknown;
    };
    if DUPLICATE_KEY.contains(&code) {
        ErrorKind::DuplicateKey
    } else if FOREIGN_KEY.contains(&code) {
        ErrorKind::ForeignKeyViolation
    } else if NOT_NULL.contains(&code) {
        ErrorKind::NotNullViolation
    } else if CONNECTION.contains(&code) {
        ErrorKind::ConnectionFailure
    } else if TIMEOUT.contains(&code) {
        ErrorKind::Timeout
    } else if SYNTAX_OR_UNSUPPORTED.contains(&code) {
        ErrorKind::SyntaxOrUnsupportedFeature
    } else {
        ErrorKind::Unknown
    }
}

/// Classify a native error, keeping its code and message.
pub fn classify(err: &DbError, context: ErrorContext) -> ClassifiedError {
    ClassifiedError {
        kind: classify_code(err.code),
        code: err.code,
        message: err.message.clone(),
        context,
    }
}

/// Convert a pass-through native error into a classified one. Every other
/// error is returned unchanged.
pub fn translate(err: OrmError) -> OrmError {
    match err {
        OrmError::Database { source, context } => {
            OrmError::Classified(classify(&source, context))
        }
        other => other,
    }
}

// Codes that mean the object a DDL statement targets is already in the
// requested state. The migrator treats them as success.

/// Object does not exist (on DROP).
pub(crate) const ABSENT_ON_DROP: &[i32] = &[
    942,  // table or view does not exist
    1418, // specified index does not exist
    2289, // sequence does not exist
    4080, // trigger does not exist
    2443, // cannot drop constraint - nonexistent constraint
    904,  // invalid identifier (DROP COLUMN on a missing column)
];

/// Object already exists (on CREATE/ADD).
///
/// Excludes 2260, 2261 and 1408: those report an equivalent object under another
/// name, which the name-based diff would keep re-emitting.
pub(crate) const PRESENT_ON_CREATE: &[i32] = &[
    955,  // name is already used by an existing object
    1430, // column being added already exists in table
    2275, // such a referential constraint already exists
    1442, // column to be modified to NOT NULL is already NOT NULL
    1451, // column to be modified to NULL cannot be modified to NULL
];

pub(crate) fn is_absent_on_drop(err: &OrmError) -> bool {
    err.native_code()
        .is_some_and(|code| ABSENT_ON_DROP.contains(&code))
}

pub(crate) fn is_present_on_create(err: &OrmError) -> bool {
    err.native_code()
        .is_some_and(|code| PRESENT_ON_CREATE.contains(&code))
}
