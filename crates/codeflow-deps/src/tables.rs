//! Static lookup tables for import classification
//!
//! Both tables are keyed by the top-level import identifier. Edit the alias
//! table here, never in control flow, and bump [`ALIAS_TABLE_VERSION`] when an
//! entry changes meaning.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Version of the alias and version-pin tables
pub const ALIAS_TABLE_VERSION: u32 = 3;

/// Python 3 standard-library top-level modules
pub const STDLIB_MODULES: &[&str] = &[
    "__future__", "_thread", "abc", "aifc", "argparse", "array", "ast", "asynchat",
    "asyncio", "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "bisect",
    "builtins", "bz2", "cProfile", "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd",
    "code", "codecs", "codeop", "collections", "colorsys", "compileall", "concurrent",
    "configparser", "contextlib", "contextvars", "copy", "copyreg", "crypt", "csv",
    "ctypes", "curses", "dataclasses", "datetime", "dbm", "decimal", "difflib", "dis",
    "doctest", "email", "encodings", "ensurepip", "enum", "errno", "faulthandler",
    "fcntl", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib", "functools", "gc",
    "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq",
    "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "lib2to3", "linecache", "locale",
    "logging", "lzma", "mailbox", "mailcap", "marshal", "math", "mimetypes", "mmap",
    "modulefinder", "msvcrt", "multiprocessing", "netrc", "nntplib", "ntpath", "numbers",
    "operator", "optparse", "os", "ossaudiodev", "pathlib", "pdb", "pickle",
    "pickletools", "pipes", "pkgutil", "platform", "plistlib", "poplib", "posix",
    "posixpath", "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr",
    "pydoc", "queue", "quopri", "random", "re", "readline", "reprlib", "resource",
    "rlcompleter", "runpy", "sched", "secrets", "select", "selectors", "shelve", "shlex",
    "shutil", "signal", "site", "smtplib", "sndhdr", "socket", "socketserver", "spwd",
    "sqlite3", "ssl", "stat", "statistics", "string", "stringprep", "struct",
    "subprocess", "sunau", "symtable", "sys", "sysconfig", "syslog", "tabnanny",
    "tarfile", "telnetlib", "tempfile", "termios", "textwrap", "threading", "time",
    "timeit", "tkinter", "token", "tokenize", "tomllib", "trace", "traceback",
    "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing", "unicodedata",
    "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave", "weakref",
    "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc", "zipapp",
    "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Import identifier → installable distribution name
pub const ALIAS_TABLE: &[(&str, &str)] = &[
    // Web frameworks
    ("fastapi", "fastapi"),
    ("uvicorn", "uvicorn"),
    ("flask", "flask"),
    ("django", "django"),
    ("tornado", "tornado"),
    ("bottle", "bottle"),
    ("cherrypy", "cherrypy"),
    ("starlette", "starlette"),
    ("pydantic", "pydantic"),
    ("jinja2", "jinja2"),
    // Data science
    ("pandas", "pandas"),
    ("numpy", "numpy"),
    ("matplotlib", "matplotlib"),
    ("mpl_toolkits", "matplotlib"),
    ("seaborn", "seaborn"),
    ("plotly", "plotly"),
    ("bokeh", "bokeh"),
    ("scipy", "scipy"),
    ("statsmodels", "statsmodels"),
    ("sklearn", "scikit-learn"),
    ("skimage", "scikit-image"),
    ("sympy", "sympy"),
    ("networkx", "networkx"),
    // Machine learning
    ("tensorflow", "tensorflow"),
    ("torch", "torch"),
    ("torchvision", "torchvision"),
    ("torchaudio", "torchaudio"),
    ("transformers", "transformers"),
    ("keras", "keras"),
    ("xgboost", "xgboost"),
    ("lightgbm", "lightgbm"),
    ("catboost", "catboost"),
    // Imaging
    ("PIL", "pillow"),
    ("cv2", "opencv-python"),
    ("imageio", "imageio"),
    // GUI and games
    ("pygame", "pygame"),
    ("arcade", "arcade"),
    ("pymunk", "pymunk"),
    ("pyglet", "pyglet"),
    ("PyQt5", "pyqt5"),
    ("PyQt6", "pyqt6"),
    ("PySide2", "pyside2"),
    ("PySide6", "pyside6"),
    ("kivy", "kivy"),
    ("wx", "wxpython"),
    // CLI
    ("click", "click"),
    ("rich", "rich"),
    ("typer", "typer"),
    ("fire", "fire"),
    ("colorama", "colorama"),
    ("tqdm", "tqdm"),
    // HTTP and scraping
    ("requests", "requests"),
    ("httpx", "httpx"),
    ("aiohttp", "aiohttp"),
    ("urllib3", "urllib3"),
    ("bs4", "beautifulsoup4"),
    ("lxml", "lxml"),
    ("selenium", "selenium"),
    ("websockets", "websockets"),
    // Databases
    ("psycopg2", "psycopg2-binary"),
    ("pymysql", "pymysql"),
    ("sqlalchemy", "sqlalchemy"),
    ("redis", "redis"),
    ("pymongo", "pymongo"),
    ("peewee", "peewee"),
    // Concurrency
    ("gevent", "gevent"),
    ("celery", "celery"),
    // Testing and tooling
    ("pytest", "pytest"),
    ("mypy", "mypy"),
    ("black", "black"),
    ("flake8", "flake8"),
    ("pylint", "pylint"),
    // Utilities
    ("yaml", "pyyaml"),
    ("toml", "toml"),
    ("dotenv", "python-dotenv"),
    ("dateutil", "python-dateutil"),
    ("loguru", "loguru"),
    ("attr", "attrs"),
    ("serial", "pyserial"),
    ("psutil", "psutil"),
    ("pyperclip", "pyperclip"),
    ("pyttsx3", "pyttsx3"),
    ("openpyxl", "openpyxl"),
    ("docx", "python-docx"),
    ("qrcode", "qrcode"),
    ("emoji", "emoji"),
    // Visualization apps
    ("dash", "dash"),
    ("streamlit", "streamlit"),
    ("gradio", "gradio"),
    ("panel", "panel"),
    // Security
    ("cryptography", "cryptography"),
    ("bcrypt", "bcrypt"),
    ("Crypto", "pycryptodome"),
    ("jwt", "pyjwt"),
];

/// Recommended lower bounds, keyed by distribution name
pub const VERSION_PINS: &[(&str, &str)] = &[
    ("arcade", ">=2.6.0"),
    ("click", ">=8.1.0"),
    ("django", ">=4.2.0"),
    ("fastapi", ">=0.100.0"),
    ("flask", ">=2.3.0"),
    ("matplotlib", ">=3.7.0"),
    ("numpy", ">=1.24.0"),
    ("pandas", ">=2.0.0"),
    ("pillow", ">=10.0.0"),
    ("pygame", ">=2.5.0"),
    ("pytest", ">=7.4.0"),
    ("pyyaml", ">=6.0"),
    ("requests", ">=2.31.0"),
    ("rich", ">=13.5.0"),
    ("scikit-learn", ">=1.3.0"),
    ("seaborn", ">=0.12.0"),
    ("tensorflow", ">=2.13.0"),
    ("torch", ">=2.0.0"),
    ("uvicorn", ">=0.23.0"),
];

static STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| STDLIB_MODULES.iter().copied().collect());

static ALIASES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| ALIAS_TABLE.iter().copied().collect());

static PINS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| VERSION_PINS.iter().copied().collect());

/// Check standard-library membership (exact top-level match)
#[inline]
#[must_use]
pub fn is_stdlib(root: &str) -> bool {
    STDLIB.contains(root)
}

/// Distribution name for an import identifier
#[inline]
#[must_use]
pub fn alias_for(root: &str) -> Option<&'static str> {
    ALIASES.get(root).copied()
}

/// Recommended version constraint for a distribution
#[inline]
#[must_use]
pub fn version_pin(package: &str) -> Option<&'static str> {
    PINS.get(package).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_have_no_duplicate_keys() {
        assert_eq!(STDLIB.len(), STDLIB_MODULES.len());
        assert_eq!(ALIASES.len(), ALIAS_TABLE.len());
        assert_eq!(PINS.len(), VERSION_PINS.len());
    }

    #[test]
    fn alias_keys_are_not_stdlib() {
        for (import, _) in ALIAS_TABLE {
            assert!(!is_stdlib(import), "{import} is shadowed by stdlib");
        }
    }

    #[test]
    fn pins_reference_known_distributions() {
        let packages: HashSet<_> = ALIAS_TABLE.iter().map(|(_, p)| *p).collect();
        for (package, _) in VERSION_PINS {
            assert!(packages.contains(package), "pin for unknown package {package}");
        }
    }

    #[test]
    fn distribution_names_are_lowercase() {
        for (_, package) in ALIAS_TABLE {
            assert_eq!(*package, package.to_lowercase());
        }
    }
}
