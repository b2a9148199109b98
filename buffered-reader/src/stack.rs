use std::io;
use std::fmt;
use std::io::{Error, ErrorKind};

use super::*;

/// A pile of boxed filters.
///
/// The bottom of the stack is the source; every `push` wraps the
/// current top in a new filter, and every `pop` removes the top
/// filter again, dropping it.  A filter's `Drop` implementation is
/// thus its teardown hook.
///
/// The stack itself is a `BufferedReader` that reads from the top
/// filter.
pub struct Stack<'a, C> {
    top: Box<dyn BufferedReader<C> + 'a>,
    // The number of filters above the source.
    depth: usize,
    trace: bool,
}

impl<'a, C> fmt::Debug for Stack<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Stack")
            .field("depth", &self.depth)
            .field("top", &self.top)
            .finish()
    }
}

impl<'a, C: Default + 'a> Stack<'a, C> {
    /// Creates a stack whose source is `source`.
    pub fn new(source: Box<dyn BufferedReader<C> + 'a>) -> Self {
        Stack {
            top: source,
            depth: 0,
            trace: false,
        }
    }

    /// Enables or disables tracing of push and pop operations.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Returns the number of filters above the source.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pushes a filter.
    ///
    /// `f` is handed the current top of the stack, and returns the
    /// new top, which normally wraps the old one.
    pub fn push<F>(&mut self, f: F)
        where F: FnOnce(Box<dyn BufferedReader<C> + 'a>)
                        -> Box<dyn BufferedReader<C> + 'a>
    {
        let old = std::mem::replace(
            &mut self.top, Box::new(EOF::with_cookie(C::default())));
        self.top = f(old);
        self.depth += 1;

        if self.trace {
            log::trace!("{:2$}Stack::push: {:?}", "", self.top, self.depth);
        }
    }

    /// Like `push`, but the constructor may fail.
    ///
    /// If it fails, it must hand the old top back with the error, so
    /// that the stack is left as it was.
    pub fn try_push<F, E>(&mut self, f: F) -> std::result::Result<(), E>
        where F: FnOnce(Box<dyn BufferedReader<C> + 'a>)
                        -> std::result::Result<Box<dyn BufferedReader<C> + 'a>,
                                               (Box<dyn BufferedReader<C> + 'a>, E)>
    {
        let old = std::mem::replace(
            &mut self.top, Box::new(EOF::with_cookie(C::default())));
        match f(old) {
            Ok(new) => {
                self.top = new;
                self.depth += 1;
                Ok(())
            },
            Err((old, e)) => {
                self.top = old;
                Err(e)
            },
        }
    }

    /// Pops the top filter.
    ///
    /// The filter is dropped.  It is an error to pop the source.
    ///
    /// In debug builds, popping a filter with a declared length that
    /// still has unread data panics: the caller must drain it (e.g.
    /// using `drop_eof`) first.
    pub fn pop(&mut self) -> io::Result<()> {
        if self.depth == 0 {
            return Err(Error::new(ErrorKind::InvalidInput,
                                  "can't pop the source"));
        }

        debug_assert!(self.top.remaining().map(|r| r == 0).unwrap_or(true),
                      "popping a filter with {:?} unread bytes",
                      self.top.remaining());

        let top = std::mem::replace(
            &mut self.top, Box::new(EOF::with_cookie(C::default())));
        match top.into_inner() {
            Some(inner) => {
                self.top = inner;
                self.depth -= 1;
                if self.trace {
                    log::trace!("{:1$}Stack::pop", "", self.depth);
                }
                Ok(())
            },
            None => Err(Error::new(ErrorKind::InvalidInput,
                                   "filter has no inner reader")),
        }
    }

    /// Pops filters until only `depth` filters remain.
    pub fn pop_to(&mut self, depth: usize) -> io::Result<()> {
        while self.depth > depth {
            self.pop()?;
        }
        Ok(())
    }

    /// Returns the source, dropping any filters.
    pub fn into_source(mut self) -> Box<dyn BufferedReader<C> + 'a> {
        while self.depth > 0 {
            let top = std::mem::replace(
                &mut self.top, Box::new(EOF::with_cookie(C::default())));
            match top.into_inner() {
                Some(inner) => self.top = inner,
                None => break,
            }
            self.depth -= 1;
        }
        self.top
    }
}

impl<'a, C> io::Read for Stack<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.top.read(buf)
    }
}

impl<'a, C> BufferedReader<C> for Stack<'a, C> {
    fn buffer(&self) -> &[u8] {
        self.top.buffer()
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.top.data(amount)
    }

    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.top.data_hard(amount)
    }

    fn data_eof(&mut self) -> io::Result<&[u8]> {
        self.top.data_eof()
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.top.consume(amount)
    }

    fn data_consume(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.top.data_consume(amount)
    }

    fn data_consume_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.top.data_consume_hard(amount)
    }

    fn remaining(&self) -> Option<u64> {
        self.top.remaining()
    }

    fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<C>> {
        Some(self.top.as_mut())
    }

    fn get_ref(&self) -> Option<&dyn BufferedReader<C>> {
        Some(self.top.as_ref())
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
            where Self: 'b {
        Some(self.top)
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        self.top.cookie_set(cookie)
    }

    fn cookie_ref(&self) -> &C {
        self.top.cookie_ref()
    }

    fn cookie_mut(&mut self) -> &mut C {
        self.top.cookie_mut()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::rc::Rc;
    use std::cell::Cell;

    #[test]
    fn push_pop() {
        let data : &[u8] = b"0123456789abcdef";
        let mut stack = Stack::new(Box::new(Memory::new(data)));

        stack.push(|top| Box::new(Region::new(top, 10).unwrap()));
        stack.push(|top| Box::new(Region::new(top, 4).unwrap()));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.steal_eof().unwrap(), b"0123");

        stack.pop().unwrap();
        assert_eq!(stack.remaining(), Some(6));
        assert_eq!(stack.steal_eof().unwrap(), b"456789");

        stack.pop().unwrap();
        assert_eq!(stack.depth(), 0);
        assert!(stack.pop().is_err());
        assert_eq!(stack.steal_eof().unwrap(), b"abcdef");
    }

    #[test]
    fn try_push() {
        let data : &[u8] = b"0123";
        let mut stack = Stack::new(Box::new(Memory::new(data)));

        let r: Result<(), io::Error> = stack.try_push(|top| {
            // Too long for what is left.
            if top.remaining().unwrap() < 10 {
                Err((top, Error::new(ErrorKind::InvalidData, "overrun")))
            } else {
                Ok(Box::new(Region::new(top, 10).unwrap())
                   as Box<dyn BufferedReader<()>>)
            }
        });
        assert!(r.is_err());
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.steal_eof().unwrap(), b"0123");
    }

    // A filter that counts how often it has been torn down.
    #[derive(Debug)]
    struct Teardown<'a> {
        reader: Box<dyn BufferedReader<()> + 'a>,
        drops: Rc<Cell<usize>>,
    }

    impl<'a> Drop for Teardown<'a> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    impl<'a> io::Read for Teardown<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reader.read(buf)
        }
    }

    impl<'a> BufferedReader<()> for Teardown<'a> {
        fn buffer(&self) -> &[u8] {
            self.reader.buffer()
        }
        fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
            self.reader.data(amount)
        }
        fn consume(&mut self, amount: usize) -> &[u8] {
            self.reader.consume(amount)
        }
        fn get_mut(&mut self) -> Option<&mut dyn BufferedReader<()>> {
            Some(self.reader.as_mut())
        }
        fn get_ref(&self) -> Option<&dyn BufferedReader<()>> {
            Some(self.reader.as_ref())
        }
        fn into_inner<'b>(mut self: Box<Self>)
                -> Option<Box<dyn BufferedReader<()> + 'b>>
                where Self: 'b {
            let reader = std::mem::replace(&mut self.reader,
                                           Box::new(EOF::new()));
            Some(reader)
        }
        fn cookie_set(&mut self, cookie: ()) -> () {
            self.reader.cookie_set(cookie)
        }
        fn cookie_ref(&self) -> &() {
            self.reader.cookie_ref()
        }
        fn cookie_mut(&mut self) -> &mut () {
            self.reader.cookie_mut()
        }
    }

    #[test]
    fn teardown() {
        let drops = Rc::new(Cell::new(0));
        let data : &[u8] = b"data";

        {
            let mut stack = Stack::new(Box::new(Memory::new(data)));
            let d = drops.clone();
            stack.push(move |top| Box::new(Teardown { reader: top, drops: d }));
            let d = drops.clone();
            stack.push(move |top| Box::new(Teardown { reader: top, drops: d }));

            stack.pop().unwrap();
            assert_eq!(drops.get(), 1);
            // The other filter is torn down with the stack.
        }
        assert_eq!(drops.get(), 2);
    }
}
